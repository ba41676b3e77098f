use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts the work units executing right now and remembers the peak.
#[derive(Debug)]
pub struct Occupancy {
    capacity: usize,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Occupancy {
    /// Creates a new `Occupancy` counter.
    ///
    /// # Arguments
    /// * `capacity` - The amount of units allowed to execute at once.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Marks a unit as executing until the returned guard is dropped.
    ///
    /// # Panics
    /// In debug builds, if more than `capacity` units are executing.
    pub fn enter(&self) -> OccupancyGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert!(
            now <= self.capacity,
            "{now} units in flight with a capacity of {}",
            self.capacity
        );

        self.peak.fetch_max(now, Ordering::AcqRel);
        OccupancyGuard { occupancy: self }
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    /// Starts tracking a new peak from the units executing right now.
    pub fn reset_peak(&self) {
        self.peak.store(self.current(), Ordering::Release);
    }
}

/// Keeps a unit counted as executing.
#[derive(Debug)]
pub struct OccupancyGuard<'a> {
    occupancy: &'a Occupancy,
}

impl Drop for OccupancyGuard<'_> {
    fn drop(&mut self) {
        self.occupancy.current.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_peak() {
        let occupancy = Occupancy::new(3);

        {
            let _a = occupancy.enter();
            let _b = occupancy.enter();
            assert_eq!(occupancy.current(), 2);
        }

        let _c = occupancy.enter();
        assert_eq!(occupancy.current(), 1);
        assert_eq!(occupancy.peak(), 2);

        occupancy.reset_peak();
        assert_eq!(occupancy.peak(), 1);
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn over_capacity_panics_in_debug() {
        let occupancy = Occupancy::new(1);
        let _a = occupancy.enter();
        let _b = occupancy.enter();
    }
}
