use std::mem;

use parking_lot::Mutex;

use crate::{
    error::UnitErr,
    storage::{Result, SizeMismatchErr},
    synchronization::EpochClock,
};

/// Parameters guarded by a single lock that every work unit takes to update them.
///
/// Updates serialize on the lock, so within an epoch every unit sees the
/// writes of the units that ran before it.
#[derive(Debug)]
pub struct DirectStore {
    nparams: usize,
    buffers: Mutex<Buffers>,
    clock: EpochClock,
}

/// The live parameters and a scratch copy an update works on before it's committed.
#[derive(Debug)]
struct Buffers {
    params: Box<[f32]>,
    scratch: Box<[f32]>,
}

impl DirectStore {
    /// Creates a new `DirectStore`.
    ///
    /// # Arguments
    /// * `params` - The initial state of the parameters.
    ///
    /// # Returns
    /// A new `DirectStore` instance.
    pub fn new(params: Vec<f32>) -> Self {
        let scratch = params.clone().into_boxed_slice();

        Self {
            nparams: params.len(),
            buffers: Mutex::new(Buffers {
                params: params.into_boxed_slice(),
                scratch,
            }),
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

    /// Runs `update` on a copy of the parameters while holding the lock and
    /// commits the copy once `update` returns.
    ///
    /// If `update` panics the parameters are left as they were.
    ///
    /// # Arguments
    /// * `stamp` - The epoch the calling unit belongs to.
    /// * `update` - Reads and writes the parameters, must not block.
    ///
    /// # Returns
    /// A `StaleEpoch` error, leaving the parameters untouched, if the epoch was sealed.
    pub fn update<F>(&self, stamp: usize, update: F) -> std::result::Result<(), UnitErr>
    where
        F: FnOnce(&mut [f32]),
    {
        let mut buffers = self.buffers.lock();
        self.clock.check(stamp)?;

        let Buffers { params, scratch } = &mut *buffers;
        scratch.copy_from_slice(&params[..]);
        update(&mut scratch[..]);
        mem::swap(params, scratch);
        Ok(())
    }

    /// Closes the current epoch, later updates stamped with it are rejected.
    ///
    /// # Returns
    /// The epoch that is now open.
    pub fn seal(&self) -> usize {
        let _buffers = self.buffers.lock();
        self.clock.advance()
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
        out.copy_from_slice(&self.buffers.lock().params);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use super::*;

    #[test]
    fn updates_in_place() {
        let store = DirectStore::new(vec![0.; 3]);

        store
            .update(0, |params| params.iter_mut().for_each(|p| *p += 1.))
            .unwrap();
        store.update(0, |params| params[0] += 1.).unwrap();

        let mut out = [0.; 3];
        store.pull_params(&mut out).unwrap();
        assert_eq!(out, [2., 1., 1.]);
    }

    #[test]
    fn panicking_update_leaves_no_trace() {
        let store = DirectStore::new(vec![0.; 2]);
        store.update(0, |params| params[1] += 1.).unwrap();

        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            store.update(0, |params| {
                params[0] += 5.;
                panic!("halfway through");
            })
        }));
        assert!(unwound.is_err());

        store.update(0, |params| params[1] += 1.).unwrap();

        let mut out = [0.; 2];
        store.pull_params(&mut out).unwrap();
        assert_eq!(out, [0., 2.]);
    }

    #[test]
    fn sealed_epoch_rejects_updates() {
        let store = DirectStore::new(vec![0.]);
        assert_eq!(store.seal(), 1);

        let err = store.update(0, |params| params[0] = 9.).unwrap_err();
        assert_eq!(
            err,
            UnitErr::StaleEpoch {
                stamp: 0,
                current: 1
            }
        );

        let mut out = [0.];
        store.pull_params(&mut out).unwrap();
        assert_eq!(out, [0.]);
    }

    #[test]
    fn pull_size_mismatch() {
        let store = DirectStore::new(vec![0.; 2]);
        assert!(store.pull_params(&mut [0.; 3]).is_err());
    }
}
