use std::{collections::BTreeMap, mem, num::NonZeroUsize, sync::Arc, time::Instant};

use log::{info, warn};
use parking_lot::Mutex;
use rand::{SeedableRng, rngs::StdRng};
use rayon::prelude::*;

use super::{Tree, grower};
use crate::{
    Admission,
    data::{self, Example},
    error::{Result, TrainErr, UnitErr},
    evaluation::Classifier,
    execution::{Job, PoolReport, WorkSource, WorkerPool},
    initialization::seed_from_clock,
};

/// Labels a forest can vote on.
pub trait Label: Ord + Clone + Send + Sync + 'static {}

impl<T: Ord + Clone + Send + Sync + 'static> Label for T {}

/// Grows a bagged forest, one tree per work unit.
#[derive(Debug, Clone)]
pub struct ForestBuilder {
    trees: NonZeroUsize,
    max_depth: usize,
    workers: NonZeroUsize,
    seed: Option<u64>,
}

impl ForestBuilder {
    /// Creates a new `ForestBuilder`.
    ///
    /// # Arguments
    /// * `trees` - The amount of trees to grow.
    /// * `max_depth` - The maximum amount of splits from a root to a leaf.
    /// * `workers` - The maximum amount of trees grown at once.
    ///
    /// # Returns
    /// A new `ForestBuilder` or an error if `trees` or `workers` is zero.
    pub fn new(trees: usize, max_depth: usize, workers: usize) -> Result<Self> {
        Ok(Self {
            trees: NonZeroUsize::new(trees).ok_or(TrainErr::ZeroTrees)?,
            max_depth,
            workers: NonZeroUsize::new(workers).ok_or(TrainErr::ZeroWorkers)?,
            seed: None,
        })
    }

    /// Fixes the seed of the bootstrap samples and split choices.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn trees(&self) -> usize {
        self.trees.get()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Grows every tree on the worker pool, at most `workers` at a time.
    ///
    /// Tree `i` always draws from the same seeded rng, so the result doesn't
    /// depend on the order trees finish in.
    ///
    /// # Arguments
    /// * `data` - The training examples, malformed ones are skipped.
    ///
    /// # Returns
    /// The forest, ordered by tree index, and the report of the pool.
    pub async fn grow<L: Label>(&self, data: &[Example<L>]) -> (Forest<L>, PoolReport) {
        let start = Instant::now();
        let job = Arc::new(GrowJob {
            data: well_formed(data),
            max_depth: self.max_depth,
            seed: self.seed.unwrap_or_else(seed_from_clock),
            grown: Mutex::new(Vec::with_capacity(self.trees.get())),
        });

        let units: Arc<[usize]> = (0..self.trees.get()).collect();
        let pool = WorkerPool::new(self.workers, Admission::FanOut);
        let report = pool.run(Arc::clone(&job), WorkSource::new(units, 0)).await;

        let mut grown = mem::take(&mut *job.grown.lock());
        grown.sort_by_key(|(idx, _)| *idx);
        let forest = Forest::from_trees(grown.into_iter().map(|(_, tree)| tree).collect());

        info!(
            "forest grown: trees={} failed={} peak_in_flight={} elapsed_ms={}",
            forest.len(),
            report.failed,
            report.peak_in_flight,
            start.elapsed().as_millis(),
        );

        (forest, report)
    }

    /// Grows every tree in order on the calling thread.
    ///
    /// With a fixed seed it returns the same forest as `grow`.
    pub fn grow_sequential<L: Label>(&self, data: &[Example<L>]) -> Forest<L> {
        let job = GrowJob {
            data: well_formed(data),
            max_depth: self.max_depth,
            seed: self.seed.unwrap_or_else(seed_from_clock),
            grown: Mutex::new(Vec::new()),
        };

        let trees = (0..self.trees.get()).map(|idx| job.grow_tree(idx)).collect();
        Forest::from_trees(trees)
    }
}

/// Keeps the examples sharing the dimension of the first one with finite features.
fn well_formed<L: Clone>(data: &[Example<L>]) -> Arc<[Example<L>]> {
    let dim = data.first().map_or(0, |e| e.features.len());
    let kept: Arc<[Example<L>]> = data
        .iter()
        .filter(|e| e.features.len() == dim && e.features.iter().all(|x| x.is_finite()))
        .cloned()
        .collect();

    if kept.len() < data.len() {
        warn!(
            "skipping malformed examples: skipped={} kept={}",
            data.len() - kept.len(),
            kept.len()
        );
    }

    kept
}

struct GrowJob<L> {
    data: Arc<[Example<L>]>,
    max_depth: usize,
    seed: u64,
    grown: Mutex<Vec<(usize, Tree<L>)>>,
}

impl<L: Label> GrowJob<L> {
    fn grow_tree(&self, idx: usize) -> Tree<L> {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(idx as u64));
        let features = self.data.first().map_or(0, |e| e.features.len());
        let sample = data::bootstrap(&self.data[..], &mut rng);

        grower::grow(sample, features, self.max_depth, &mut rng)
    }
}

impl<L: Label> Job for GrowJob<L> {
    type Item = usize;

    fn process(
        &self,
        _slot: usize,
        _stamp: usize,
        idx: &usize,
    ) -> std::result::Result<(), UnitErr> {
        let tree = self.grow_tree(*idx);
        self.grown.lock().push((*idx, tree));
        Ok(())
    }
}

/// A bagged forest of independently grown trees, read only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest<L> {
    trees: Vec<Tree<L>>,
}

impl<L: Label> Forest<L> {
    pub fn from_trees(trees: Vec<Tree<L>>) -> Self {
        Self { trees }
    }

    pub fn trees(&self) -> &[Tree<L>] {
        &self.trees
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Lets every tree vote concurrently on `features`.
    ///
    /// # Returns
    /// The most voted label, the smallest one on a tie, or `None` if every tree abstained.
    pub fn predict(&self, features: &[f32]) -> Option<L> {
        let votes = Mutex::new(BTreeMap::new());

        self.trees
            .par_iter()
            .filter_map(|tree| tree.predict(features))
            .for_each(|label| *votes.lock().entry(label).or_insert(0usize) += 1);

        let mut best: Option<(&L, usize)> = None;
        for (label, count) in votes.into_inner() {
            if best.is_none_or(|(_, most)| count > most) {
                best = Some((label, count));
            }
        }

        best.map(|(label, _)| label.clone())
    }
}

impl<L: Label> Classifier for Forest<L> {
    type Label = L;

    fn classify(&self, features: &[f32]) -> Option<L> {
        self.predict(features)
    }
}
