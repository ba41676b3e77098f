use std::{
    cell::RefCell,
    mem,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
    sync::Arc,
    time::Instant,
};

use log::{debug, error, info, warn};
use rand::{SeedableRng, rngs::StdRng};
use tokio::task;

use super::{
    EpochReport, Objective, TrainReport,
    jobs::{AccumulateJob, DirectJob},
};
use crate::{
    config::{Discipline, TrainerConfig},
    error::{Result, TrainErr},
    execution::{PoolReport, WorkSource, WorkerPool},
    initialization::{self, seed_from_clock},
    optimization,
    storage::{AccumulatingStore, DirectStore, LocalAccumulators},
};

/// Drives a training run: initializes the parameters, runs every epoch through
/// the worker pool and freezes the result.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    /// Creates a new `Trainer`.
    ///
    /// # Arguments
    /// * `config` - The already validated bounds of the run.
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Trains `objective` over `data`.
    ///
    /// No epoch starts before the previous one was applied. The input is only read.
    ///
    /// # Arguments
    /// * `objective` - The model to train.
    /// * `data` - The work units, fed in order on every epoch.
    ///
    /// # Returns
    /// The frozen model or a `TrainErr` if it couldn't be initialized.
    pub async fn train<O: Objective>(
        &self,
        objective: O,
        data: Arc<[O::Item]>,
    ) -> Result<Trained<O>> {
        let seed = self.config.seed().unwrap_or_else(seed_from_clock);
        let params = init_params(&objective, seed)?;

        info!(
            "training started: params={} units={} epochs={} workers={} discipline={:?} admission={:?}",
            params.len(),
            data.len(),
            self.config.epochs(),
            self.config.workers(),
            self.config.discipline(),
            self.config.admission(),
        );

        let start = Instant::now();
        let objective = Arc::new(objective);

        let (params, epochs) = match self.config.discipline() {
            Discipline::Sequential => {
                let (objective, data) = (Arc::clone(&objective), Arc::clone(&data));
                let epochs = self.config.epochs();

                task::spawn_blocking(move || {
                    train_sequential(&*objective, &data[..], params, epochs)
                })
                .await?
            }
            Discipline::DirectWrite => self.train_direct(&objective, &data, params).await?,
            Discipline::AccumulateMerge => {
                self.train_accumulating(&objective, &data, params).await?
            }
        };

        let report = TrainReport::new(seed, epochs, start.elapsed());
        info!(
            "training finished: elapsed_ms={} processed={} failed={}",
            report.elapsed().as_millis(),
            report.processed(),
            report.failed(),
        );

        Ok(Trained {
            objective,
            params,
            report,
        })
    }

    /// Every unit writes the shared parameters in place under their lock.
    async fn train_direct<O: Objective>(
        &self,
        objective: &Arc<O>,
        data: &Arc<[O::Item]>,
        params: Vec<f32>,
    ) -> Result<(Box<[f32]>, Vec<EpochReport>)> {
        let store = Arc::new(DirectStore::new(params));
        let pool = WorkerPool::from_config(&self.config);
        let mut epochs = Vec::with_capacity(self.config.epochs());

        for epoch in 0..self.config.epochs() {
            let start = Instant::now();
            let job = Arc::new(DirectJob {
                objective: Arc::clone(objective),
                store: Arc::clone(&store),
            });

            let report = pool.run(job, WorkSource::new(Arc::clone(data), epoch)).await;
            store.seal();
            epochs.push(close_epoch(epoch, report, start));
        }

        let mut params = vec![0.; store.len()];
        store.pull_params(&mut params)?;
        Ok((params.into_boxed_slice(), epochs))
    }

    /// Every worker accumulates locally and merges once, the merged gradient
    /// is applied once per epoch after the pool is drained.
    async fn train_accumulating<O: Objective>(
        &self,
        objective: &Arc<O>,
        data: &Arc<[O::Item]>,
        params: Vec<f32>,
    ) -> Result<(Box<[f32]>, Vec<EpochReport>)> {
        let optimizer = optimization::resolve(
            self.config.optimizer(),
            objective.learning_rate(),
            params.len(),
        );

        let store = Arc::new(AccumulatingStore::new(params, optimizer));
        let pool = WorkerPool::from_config(&self.config);
        let mut epochs = Vec::with_capacity(self.config.epochs());

        for epoch in 0..self.config.epochs() {
            let start = Instant::now();
            let job = Arc::new(AccumulateJob {
                objective: Arc::clone(objective),
                store: Arc::clone(&store),
                params: store.snapshot(),
                locals: LocalAccumulators::new(pool.workers(), store.len()),
            });

            let report = pool.run(job, WorkSource::new(Arc::clone(data), epoch)).await;
            store.update_params()?;
            epochs.push(close_epoch(epoch, report, start));
        }

        let mut params = vec![0.; store.len()];
        store.pull_params(&mut params)?;
        Ok((params.into_boxed_slice(), epochs))
    }
}

/// Applies every unit in order on the calling thread.
///
/// A unit that panics is counted as failed and its partial writes are dropped.
fn train_sequential<O: Objective>(
    objective: &O,
    data: &[O::Item],
    params: Vec<f32>,
    epochs: usize,
) -> (Box<[f32]>, Vec<EpochReport>) {
    let mut params = params.into_boxed_slice();
    let mut scratch = params.clone();
    let mut reports = Vec::with_capacity(epochs);

    for epoch in 0..epochs {
        let start = Instant::now();
        let mut pool = PoolReport::default();

        for (idx, item) in data.iter().enumerate() {
            if let Err(e) = objective.check(item) {
                pool.failed += 1;
                warn!("skipping work unit: index={idx} epoch={epoch} error={e}");
                continue;
            }

            scratch.copy_from_slice(&params);
            let stepped = panic::catch_unwind(AssertUnwindSafe(|| {
                objective.step(&mut scratch, item);
            }));

            match stepped {
                Ok(()) => {
                    mem::swap(&mut params, &mut scratch);
                    pool.processed += 1;
                }
                Err(_) => {
                    pool.failed += 1;
                    error!("work unit panicked: index={idx} epoch={epoch}");
                }
            }
        }

        pool.peak_in_flight = pool.processed.min(1);
        reports.push(close_epoch(epoch, pool, start));
    }

    (params, reports)
}

/// Draws the initial parameters of `objective` from a seeded rng.
fn init_params<O: Objective>(objective: &O, seed: u64) -> Result<Vec<f32>> {
    let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(seed)));
    let mut param_gen = objective.param_gen(rng)?;
    let params = initialization::draw(&mut param_gen, objective.size());

    if params.len() != objective.size() {
        return Err(TrainErr::ParamCount {
            got: params.len(),
            expected: objective.size(),
        });
    }

    Ok(params)
}

fn close_epoch(epoch: usize, pool: PoolReport, start: Instant) -> EpochReport {
    let report = EpochReport::from_pool(epoch, pool, start.elapsed());

    debug!(
        "epoch done: epoch={} processed={} failed={} peak_in_flight={} elapsed_ms={}",
        report.epoch,
        report.processed,
        report.failed,
        report.peak_in_flight,
        report.elapsed.as_millis(),
    );

    report
}

/// The parameters of a finished run, frozen.
///
/// Reading it needs no synchronization, predictions may run concurrently.
#[derive(Debug)]
pub struct Trained<O> {
    objective: Arc<O>,
    params: Box<[f32]>,
    report: TrainReport,
}

impl<O> Trained<O> {
    pub fn objective(&self) -> &O {
        &self.objective
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn report(&self) -> &TrainReport {
        &self.report
    }
}
