use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::UnitErr;

/// Counts sealed epochs.
///
/// Work units are stamped with the epoch they were created for. A unit whose
/// stamp no longer matches the clock belongs to an epoch that has already been
/// applied and must not touch the parameters.
#[derive(Debug, Default)]
pub struct EpochClock {
    epoch: AtomicUsize,
}

impl EpochClock {
    /// Creates a new `EpochClock` starting at epoch zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> usize {
        self.epoch.load(Ordering::Acquire)
    }

    /// Seals the current epoch.
    ///
    /// # Returns
    /// The epoch that is now open.
    pub fn advance(&self) -> usize {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Checks that `stamp` is the open epoch.
    ///
    /// # Arguments
    /// * `stamp` - The epoch the work unit was created for.
    ///
    /// # Returns
    /// A `StaleEpoch` error if the clock already moved past `stamp`.
    pub fn check(&self, stamp: usize) -> Result<(), UnitErr> {
        let current = self.current();

        if stamp == current {
            Ok(())
        } else {
            Err(UnitErr::StaleEpoch { stamp, current })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_stamps_are_rejected() {
        let clock = EpochClock::new();
        assert!(clock.check(0).is_ok());

        assert_eq!(clock.advance(), 1);
        assert_eq!(
            clock.check(0),
            Err(UnitErr::StaleEpoch {
                stamp: 0,
                current: 1
            })
        );
        assert!(clock.check(1).is_ok());
    }
}
