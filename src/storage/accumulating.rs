use std::{mem, sync::Arc};

use parking_lot::{Mutex, RwLock};

use crate::{
    error::UnitErr,
    optimization::Optimizer,
    storage::{Result, SizeMismatchErr},
    synchronization::EpochClock,
};

/// Parameters that only change once per epoch.
///
/// Workers sum their contributions into `LocalAccumulators`, merge them into the
/// global gradient once and the orchestrator applies the global gradient through
/// the optimizer after every worker has merged.
#[derive(Debug)]
pub struct AccumulatingStore<O: Optimizer> {
    nparams: usize,
    params: RwLock<Box<[f32]>>,
    grad: Mutex<Box<[f32]>>,
    optimizer: Mutex<O>,
    clock: EpochClock,
}

impl<O: Optimizer> AccumulatingStore<O> {
    /// Creates a new `AccumulatingStore`.
    ///
    /// # Arguments
    /// * `params` - The initial state of the parameters.
    /// * `optimizer` - The optimization algorithm applied once per epoch.
    ///
    /// # Returns
    /// A new `AccumulatingStore` instance.
    pub fn new(params: Vec<f32>, optimizer: O) -> Self {
        let nparams = params.len();

        Self {
            nparams,
            params: RwLock::new(params.into_boxed_slice()),
            grad: Mutex::new(vec![0.; nparams].into_boxed_slice()),
            optimizer: Mutex::new(optimizer),
            clock: EpochClock::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nparams
    }

    pub fn is_empty(&self) -> bool {
        self.nparams == 0
    }

    pub fn epoch(&self) -> usize {
        self.clock.current()
    }

    /// Checks that `stamp` is the open epoch.
    pub fn check_epoch(&self, stamp: usize) -> std::result::Result<(), UnitErr> {
        self.clock.check(stamp)
    }

    /// Copies the parameters as they are at the start of the open epoch.
    ///
    /// # Returns
    /// A shared read-only copy of the parameters.
    pub fn snapshot(&self) -> Arc<[f32]> {
        Arc::from(&**self.params.read())
    }

    /// Adds a worker's local accumulator into the global gradient.
    ///
    /// # Arguments
    /// * `stamp` - The epoch the local accumulator was filled in.
    /// * `local` - The summed contributions of one worker.
    ///
    /// # Returns
    /// A `StaleEpoch` error if the epoch was already applied, in which case nothing is merged.
    pub fn merge(&self, stamp: usize, local: &[f32]) -> std::result::Result<(), UnitErr> {
        if local.len() != self.nparams {
            return Err(UnitErr::DimensionMismatch {
                got: local.len(),
                expected: self.nparams,
            });
        }

        let mut grad = self.grad.lock();
        self.clock.check(stamp)?;
        grad.iter_mut().zip(local).for_each(|(acc, g)| *acc += g);
        Ok(())
    }

    /// Seals the open epoch and applies its merged gradient.
    ///
    /// The global gradient is swapped out and the clock advanced under the
    /// gradient lock, so a late merge can't land in the next epoch.
    ///
    /// # Returns
    /// The epoch that is now open, or a `SizeMismatchErr` from the optimizer.
    pub fn update_params(&self) -> Result<usize> {
        let (grad, epoch) = {
            let mut grad = self.grad.lock();
            let epoch = self.clock.advance();
            let zeroed = vec![0.; self.nparams].into_boxed_slice();
            (mem::replace(&mut *grad, zeroed), epoch)
        };

        let mut params = self.params.write();
        self.optimizer.lock().update_params(&grad, &mut params)?;
        Ok(epoch)
    }

    /// Copies the parameters into the provided destination buffer.
    ///
    /// # Arguments
    /// * `out` - A mutable slice where the parameters will be copied.
    ///
    /// # Returns
    /// A `SizeMismatchErr` if `out` isn't the same size as this store.
    pub fn pull_params(&self, out: &mut [f32]) -> Result<()> {
        SizeMismatchErr::check(out.len(), self.nparams)?;
        out.copy_from_slice(&self.params.read());
        Ok(())
    }
}

/// One zeroed accumulator per worker slot, created fresh for every epoch.
///
/// A slot is only ever held by the worker that owns it, so its locks are uncontended.
#[derive(Debug)]
pub struct LocalAccumulators {
    slots: Box<[Local]>,
}

/// The summed contributions of a slot and the scratch buffer a single unit fills first.
#[derive(Debug)]
struct Local {
    sum: Mutex<Box<[f32]>>,
    scratch: Mutex<Box<[f32]>>,
}

impl LocalAccumulators {
    /// Creates a new set of `LocalAccumulators`.
    ///
    /// # Arguments
    /// * `workers` - The amount of worker slots.
    /// * `nparams` - The amount of parameters of the model.
    pub fn new(workers: usize, nparams: usize) -> Self {
        let zeroed = || Mutex::new(vec![0.; nparams].into_boxed_slice());
        let slots = (0..workers)
            .map(|_| Local {
                sum: zeroed(),
                scratch: zeroed(),
            })
            .collect();

        Self { slots }
    }

    fn local(&self, slot: usize) -> std::result::Result<&Local, UnitErr> {
        self.slots.get(slot).ok_or(UnitErr::OutOfRange {
            what: "worker slot",
            got: slot,
            limit: self.slots.len(),
        })
    }

    /// Lets `f` write one unit's contribution and adds it to the sum of `slot`
    /// once `f` returns.
    ///
    /// If `f` panics the sum is left as it was.
    ///
    /// # Returns
    /// An `OutOfRange` error if `slot` doesn't exist.
    pub fn contribute<F>(&self, slot: usize, f: F) -> std::result::Result<(), UnitErr>
    where
        F: FnOnce(&mut [f32]),
    {
        let local = self.local(slot)?;

        let mut scratch = local.scratch.lock();
        scratch.fill(0.);
        f(&mut scratch[..]);

        let mut sum = local.sum.lock();
        sum.iter_mut().zip(scratch.iter()).for_each(|(acc, g)| *acc += g);
        Ok(())
    }

    /// Gives `f` mutable access to the summed accumulator of `slot`.
    ///
    /// # Returns
    /// The output of `f` or an `OutOfRange` error if `slot` doesn't exist.
    pub fn with<R, F>(&self, slot: usize, f: F) -> std::result::Result<R, UnitErr>
    where
        F: FnOnce(&mut [f32]) -> R,
    {
        let local = self.local(slot)?;
        Ok(f(&mut local.sum.lock()[..]))
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use super::*;

    struct AddOptimizer;

    impl Optimizer for AddOptimizer {
        fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
            SizeMismatchErr::check(grad.len(), params.len())?;
            params.iter_mut().zip(grad).for_each(|(p, g)| *p += g);
            Ok(())
        }
    }

    #[test]
    fn merges_then_applies_once() {
        const PARAMS: usize = 4;

        let store = AccumulatingStore::new(vec![0.; PARAMS], AddOptimizer);
        store.merge(0, &[1.; PARAMS]).unwrap();
        store.merge(0, &[2.; PARAMS]).unwrap();

        assert_eq!(*store.snapshot(), [0.; PARAMS]);

        assert_eq!(store.update_params().unwrap(), 1);
        assert_eq!(*store.snapshot(), [3.; PARAMS]);

        store.update_params().unwrap();
        assert_eq!(*store.snapshot(), [3.; PARAMS]);
    }

    #[test]
    fn late_merge_is_rejected() {
        let store = AccumulatingStore::new(vec![0.], AddOptimizer);
        store.update_params().unwrap();

        assert!(matches!(
            store.merge(0, &[1.]),
            Err(UnitErr::StaleEpoch { stamp: 0, current: 1 })
        ));

        store.update_params().unwrap();
        let mut out = [0.];
        store.pull_params(&mut out).unwrap();
        assert_eq!(out, [0.]);
    }

    #[test]
    fn locals_are_independent() {
        let locals = LocalAccumulators::new(2, 2);

        locals.contribute(0, |acc| acc[0] += 1.).unwrap();
        locals.contribute(1, |acc| acc[1] += 2.).unwrap();
        assert!(locals.contribute(2, |_| {}).is_err());
        assert!(locals.with(2, |_| {}).is_err());

        locals.with(0, |acc| assert_eq!(acc, [1., 0.])).unwrap();
        locals.with(1, |acc| assert_eq!(acc, [0., 2.])).unwrap();
    }

    #[test]
    fn panicking_contribution_is_dropped() {
        let locals = LocalAccumulators::new(1, 2);
        locals.contribute(0, |acc| acc[1] += 1.).unwrap();

        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            locals.contribute(0, |acc| {
                acc[0] += 5.;
                panic!("halfway through");
            })
        }));
        assert!(unwound.is_err());

        locals.contribute(0, |acc| acc[1] += 1.).unwrap();
        locals.with(0, |acc| assert_eq!(acc, [0., 2.])).unwrap();
    }
}
