use std::sync::Arc;

use super::Objective;
use crate::{
    error::UnitErr,
    execution::Job,
    optimization::Optimizer,
    storage::{AccumulatingStore, DirectStore, LocalAccumulators},
};

/// Applies every unit to the shared parameters under their lock.
pub(super) struct DirectJob<O: Objective> {
    pub objective: Arc<O>,
    pub store: Arc<DirectStore>,
}

impl<O: Objective> Job for DirectJob<O> {
    type Item = O::Item;

    fn process(&self, _slot: usize, stamp: usize, item: &O::Item) -> Result<(), UnitErr> {
        self.objective.check(item)?;
        self.store.update(stamp, |params| self.objective.step(params, item))
    }
}

/// Sums every unit into its worker's local accumulator and merges it once per epoch.
pub(super) struct AccumulateJob<O: Objective, P: Optimizer> {
    pub objective: Arc<O>,
    pub store: Arc<AccumulatingStore<P>>,
    pub params: Arc<[f32]>,
    pub locals: LocalAccumulators,
}

impl<O, P> Job for AccumulateJob<O, P>
where
    O: Objective,
    P: Optimizer + Send + 'static,
{
    type Item = O::Item;

    fn process(&self, slot: usize, stamp: usize, item: &O::Item) -> Result<(), UnitErr> {
        self.objective.check(item)?;
        self.store.check_epoch(stamp)?;
        self.locals
            .contribute(slot, |grad| self.objective.accumulate(&self.params, item, grad))
    }

    fn drain(&self, slot: usize, stamp: usize) -> Result<(), UnitErr> {
        self.locals.with(slot, |grad| self.store.merge(stamp, grad))?
    }
}
