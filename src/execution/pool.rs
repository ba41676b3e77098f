use std::{
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use log::{debug, error, warn};
use parking_lot::Mutex;
use tokio::{
    sync::mpsc,
    task::{self, JoinError, JoinSet},
    time,
};

use super::{AdmissionGate, Job, Occupancy, WorkSource};
use crate::config::{Admission, TrainerConfig};

/// What happened during one run of a `WorkerPool`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Units that went through.
    pub processed: usize,
    /// Units that were skipped, their contribution dropped.
    pub failed: usize,
    /// Worker slots whose drain was rejected.
    pub rejected_drains: usize,
    /// The highest amount of units executing at once.
    pub peak_in_flight: usize,
    /// Whether the deadline expired before every unit went through.
    pub timed_out: bool,
}

/// A bounded set of executors for CPU bound work units.
///
/// Units run on the blocking thread pool, never more than `workers` at once
/// across every run of the pool, including units left running by a run whose
/// deadline expired. Clones share that bound.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: NonZeroUsize,
    admission: Admission,
    queue_depth: NonZeroUsize,
    deadline: Option<Duration>,
    gate: Arc<AdmissionGate>,
    occupancy: Arc<Occupancy>,
}

impl WorkerPool {
    /// Creates a new `WorkerPool`.
    ///
    /// # Arguments
    /// * `workers` - The maximum amount of units executing at once.
    /// * `admission` - How units are admitted into the pool.
    ///
    /// # Returns
    /// A new `WorkerPool` instance, without deadline.
    pub fn new(workers: NonZeroUsize, admission: Admission) -> Self {
        Self {
            workers,
            admission,
            queue_depth: TrainerConfig::DEFAULT_QUEUE_DEPTH,
            deadline: None,
            gate: Arc::new(AdmissionGate::new(workers.get())),
            occupancy: Arc::new(Occupancy::new(workers.get())),
        }
    }

    /// Creates a new `WorkerPool` with the bounds of a training run.
    pub fn from_config(config: &TrainerConfig) -> Self {
        Self::new(config.workers(), config.admission())
            .with_queue_depth(config.queue_depth())
            .with_deadline(config.deadline())
    }

    pub fn with_queue_depth(mut self, queue_depth: NonZeroUsize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers.get()
    }

    /// Runs every unit of `source` through `job` and waits for all of them.
    ///
    /// Every worker slot is drained once its units are done. Unit failures and
    /// panics are logged and counted, they never stop the run. Runs of the same
    /// pool are meant to be awaited one after the other.
    ///
    /// # Arguments
    /// * `job` - The per-unit computation.
    /// * `source` - The work units of the epoch.
    ///
    /// # Returns
    /// A `PoolReport` once every unit went through or the deadline expired.
    pub async fn run<J: Job>(&self, job: Arc<J>, source: WorkSource<J::Item>) -> PoolReport {
        self.occupancy.reset_peak();
        let tally = Arc::new(Tally::new(Arc::clone(&self.occupancy)));

        let timed_out = match self.admission {
            Admission::Pull => self.run_pull(job, source, &tally).await,
            Admission::FanOut => self.run_fan_out(job, source, &tally).await,
        };

        tally.report(timed_out)
    }

    /// Spawns `workers` long lived workers that drain a shared bounded queue.
    ///
    /// Every worker holds a gate permit for as long as it runs.
    async fn run_pull<J: Job>(
        &self,
        job: Arc<J>,
        source: WorkSource<J::Item>,
        tally: &Arc<Tally>,
    ) -> bool {
        let (tx, rx) = mpsc::channel::<usize>(self.queue_depth.get());
        let rx = Arc::new(Mutex::new(rx));
        let closed = Arc::new(AtomicBool::new(false));
        let mut workers = JoinSet::new();

        for _ in 0..self.workers.get() {
            let gate = Arc::clone(&self.gate);
            let job = Arc::clone(&job);
            let rx = Arc::clone(&rx);
            let closed = Arc::clone(&closed);
            let tally = Arc::clone(tally);
            let source = source.clone();

            workers.spawn(async move {
                let Some(permit) = gate.acquire().await else {
                    return;
                };

                let worker = task::spawn_blocking(move || {
                    let slot = permit.slot();
                    while !closed.load(Ordering::Acquire) {
                        let Some(idx) = rx.lock().blocking_recv() else {
                            break;
                        };

                        tally.execute(&*job, slot, &source, idx);
                    }

                    tally.drain(&*job, slot, source.stamp());
                    drop(permit);
                });

                log_join(worker.await);
            });
        }

        let units = source.len();
        let feed = async {
            for idx in 0..units {
                if tx.send(idx).await.is_err() {
                    break;
                }
            }

            drop(tx);
            join_all(&mut workers).await;
        };

        let timed_out = self.within_deadline(feed).await;
        if timed_out {
            closed.store(true, Ordering::Release);
        }

        timed_out
    }

    /// Spawns one task per unit once it gets a gate permit.
    async fn run_fan_out<J: Job>(
        &self,
        job: Arc<J>,
        source: WorkSource<J::Item>,
        tally: &Arc<Tally>,
    ) -> bool {
        let mut units = JoinSet::new();

        let feed = async {
            for idx in 0..source.len() {
                let Some(permit) = self.gate.acquire().await else {
                    break;
                };

                let job = Arc::clone(&job);
                let tally = Arc::clone(tally);
                let source = source.clone();

                units.spawn_blocking(move || {
                    tally.execute(&*job, permit.slot(), &source, idx);
                    drop(permit);
                });

                while let Some(joined) = units.try_join_next() {
                    log_join(joined);
                }
            }

            join_all(&mut units).await;
        };

        let timed_out = self.within_deadline(feed).await;

        for slot in 0..self.workers.get() {
            tally.drain(&*job, slot, source.stamp());
        }

        timed_out
    }

    /// Awaits `fut` for at most the configured deadline.
    ///
    /// # Returns
    /// Whether the deadline expired.
    async fn within_deadline<F: Future<Output = ()>>(&self, fut: F) -> bool {
        let Some(deadline) = self.deadline else {
            fut.await;
            return false;
        };

        match time::timeout(deadline, fut).await {
            Ok(()) => false,
            Err(_) => {
                warn!(
                    "deadline expired, proceeding with what was merged: deadline_ms={}",
                    deadline.as_millis()
                );
                true
            }
        }
    }
}

/// Shared counters of one pool run.
#[derive(Debug)]
struct Tally {
    occupancy: Arc<Occupancy>,
    processed: AtomicUsize,
    failed: AtomicUsize,
    rejected_drains: AtomicUsize,
}

impl Tally {
    fn new(occupancy: Arc<Occupancy>) -> Self {
        Self {
            occupancy,
            processed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            rejected_drains: AtomicUsize::new(0),
        }
    }

    /// Processes the unit at `idx`, counting it as in flight while it runs.
    fn execute<J: Job>(&self, job: &J, slot: usize, source: &WorkSource<J::Item>, idx: usize) {
        let stamp = source.stamp();

        let outcome = {
            let _guard = self.occupancy.enter();
            panic::catch_unwind(AssertUnwindSafe(|| job.process(slot, stamp, &source[idx])))
        };

        match outcome {
            Ok(Ok(())) => {
                self.processed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!("skipping work unit: slot={slot} index={idx} epoch={stamp} error={e}");
            }
            Err(_) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!("work unit panicked: slot={slot} index={idx} epoch={stamp}");
            }
        }
    }

    fn drain<J: Job>(&self, job: &J, slot: usize, stamp: usize) {
        if let Err(e) = job.drain(slot, stamp) {
            self.rejected_drains.fetch_add(1, Ordering::Relaxed);
            warn!("dropping worker contribution: slot={slot} epoch={stamp} error={e}");
        }
    }

    fn report(&self, timed_out: bool) -> PoolReport {
        PoolReport {
            processed: self.processed.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            rejected_drains: self.rejected_drains.load(Ordering::Acquire),
            peak_in_flight: self.occupancy.peak(),
            timed_out,
        }
    }
}

async fn join_all(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        log_join(joined);
    }
}

fn log_join(joined: Result<(), JoinError>) {
    match joined {
        Ok(()) => {}
        Err(e) if e.is_panic() => error!("worker panicked: {e}"),
        Err(e) => debug!("worker cancelled: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::error::UnitErr;

    struct SleepyJob {
        seen: AtomicUsize,
        drained: Mutex<Vec<usize>>,
    }

    impl Job for SleepyJob {
        type Item = u64;

        fn process(&self, _slot: usize, _stamp: usize, item: &u64) -> Result<(), UnitErr> {
            if *item == u64::MAX {
                return Err(UnitErr::NonFinite { index: 0 });
            }

            if *item == u64::MAX - 1 {
                panic!("poisoned unit");
            }

            thread::sleep(Duration::from_millis(*item));
            self.seen.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn drain(&self, slot: usize, _stamp: usize) -> Result<(), UnitErr> {
            self.drained.lock().push(slot);
            Ok(())
        }
    }

    fn sleepy_job() -> Arc<SleepyJob> {
        Arc::new(SleepyJob {
            seen: AtomicUsize::new(0),
            drained: Mutex::new(Vec::new()),
        })
    }

    fn pool(workers: usize, admission: Admission) -> WorkerPool {
        WorkerPool::new(NonZeroUsize::new(workers).unwrap(), admission)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn every_unit_runs_once() {
        for admission in [Admission::Pull, Admission::FanOut] {
            let job = sleepy_job();
            let source = WorkSource::new(Arc::from(vec![1u64; 40]), 0);

            let report = pool(4, admission).run(Arc::clone(&job), source).await;

            assert_eq!(report.processed, 40);
            assert_eq!(report.failed, 0);
            assert!(!report.timed_out);
            assert_eq!(job.seen.load(Ordering::Relaxed), 40);

            let mut drained = job.drained.lock().clone();
            drained.sort();
            assert_eq!(drained, [0, 1, 2, 3]);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failures_and_panics_are_not_fatal() {
        for admission in [Admission::Pull, Admission::FanOut] {
            let job = sleepy_job();
            let items = vec![0, u64::MAX, 0, u64::MAX - 1, 0];
            let source = WorkSource::new(Arc::from(items), 0);

            let report = pool(2, admission).run(Arc::clone(&job), source).await;

            assert_eq!(report.processed, 3);
            assert_eq!(report.failed, 2);
            assert_eq!(job.drained.lock().len(), 2);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deadline_stops_waiting() {
        for admission in [Admission::Pull, Admission::FanOut] {
            let job = sleepy_job();
            let source = WorkSource::new(Arc::from(vec![50u64; 8]), 0);

            let report = pool(1, admission)
                .with_deadline(Some(Duration::from_millis(10)))
                .run(job, source)
                .await;

            assert!(report.timed_out);
            assert!(report.processed < 8);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn units_left_running_keep_their_slot() {
        for admission in [Admission::Pull, Admission::FanOut] {
            let job = sleepy_job();
            let pool = pool(1, admission).with_deadline(Some(Duration::from_millis(10)));

            for stamp in 0..3 {
                let source = WorkSource::new(Arc::from(vec![60u64; 2]), stamp);
                let report = pool.run(Arc::clone(&job), source).await;
                assert!(report.timed_out);
            }

            time::sleep(Duration::from_millis(200)).await;
            assert!(pool.occupancy.peak() <= 1);
            assert_eq!(pool.occupancy.current(), 0);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_source() {
        let job = sleepy_job();
        let source = WorkSource::new(Arc::from(Vec::<u64>::new()), 0);

        let report = pool(3, Admission::Pull).run(Arc::clone(&job), source).await;

        assert_eq!(report, PoolReport::default());
        assert_eq!(job.drained.lock().len(), 3);
    }
}
