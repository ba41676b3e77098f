use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use concurrent_learning::{
    Admission, UnitErr,
    execution::{Job, WorkSource, WorkerPool},
};

/// Tracks how many units run at once and whether a slot is ever shared.
struct Tracker {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    busy_slots: Vec<AtomicBool>,
    shared_slot: AtomicBool,
}

impl Tracker {
    fn new(workers: usize) -> Arc<Self> {
        Arc::new(Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            busy_slots: (0..workers).map(|_| AtomicBool::new(false)).collect(),
            shared_slot: AtomicBool::new(false),
        })
    }
}

impl Job for Tracker {
    type Item = u64;

    fn process(&self, slot: usize, _stamp: usize, millis: &u64) -> Result<(), UnitErr> {
        if self.busy_slots[slot].swap(true, Ordering::AcqRel) {
            self.shared_slot.store(true, Ordering::Release);
        }

        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);

        thread::sleep(Duration::from_millis(*millis));

        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.busy_slots[slot].store(false, Ordering::Release);
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn never_more_than_workers_in_flight() {
    const WORKERS: usize = 3;
    const UNITS: usize = 60;

    for admission in [Admission::Pull, Admission::FanOut] {
        let tracker = Tracker::new(WORKERS);
        let pool = WorkerPool::new(NonZeroUsize::new(WORKERS).unwrap(), admission)
            .with_queue_depth(NonZeroUsize::new(4).unwrap());
        let source = WorkSource::new(Arc::from(vec![2u64; UNITS]), 0);

        let report = pool.run(Arc::clone(&tracker), source).await;

        assert_eq!(report.processed, UNITS);
        assert!(report.peak_in_flight <= WORKERS);
        assert!(tracker.peak.load(Ordering::Acquire) <= WORKERS);
        assert!(!tracker.shared_slot.load(Ordering::Acquire));
        assert_eq!(tracker.in_flight.load(Ordering::Acquire), 0);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn single_worker_runs_units_one_at_a_time() {
    for admission in [Admission::Pull, Admission::FanOut] {
        let tracker = Tracker::new(1);
        let pool = WorkerPool::new(NonZeroUsize::MIN, admission);
        let source = WorkSource::new(Arc::from(vec![1u64; 10]), 0);

        let report = pool.run(Arc::clone(&tracker), source).await;

        assert_eq!(report.processed, 10);
        assert_eq!(report.peak_in_flight, 1);
        assert_eq!(tracker.peak.load(Ordering::Acquire), 1);
    }
}
