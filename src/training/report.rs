use std::time::Duration;

use crate::execution::PoolReport;

/// What happened during one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochReport {
    pub epoch: usize,
    pub processed: usize,
    pub failed: usize,
    pub rejected_drains: usize,
    pub peak_in_flight: usize,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl EpochReport {
    pub(super) fn from_pool(epoch: usize, pool: PoolReport, elapsed: Duration) -> Self {
        Self {
            epoch,
            processed: pool.processed,
            failed: pool.failed,
            rejected_drains: pool.rejected_drains,
            peak_in_flight: pool.peak_in_flight,
            timed_out: pool.timed_out,
            elapsed,
        }
    }
}

/// What happened during a whole training run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    seed: u64,
    epochs: Vec<EpochReport>,
    elapsed: Duration,
}

impl TrainReport {
    pub(super) fn new(seed: u64, epochs: Vec<EpochReport>, elapsed: Duration) -> Self {
        Self {
            seed,
            epochs,
            elapsed,
        }
    }

    /// The seed the parameters were initialized with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn epochs(&self) -> &[EpochReport] {
        &self.epochs
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn processed(&self) -> usize {
        self.epochs.iter().map(|e| e.processed).sum()
    }

    pub fn failed(&self) -> usize {
        self.epochs.iter().map(|e| e.failed).sum()
    }

    /// The highest amount of units that ran at once in any epoch.
    pub fn peak_in_flight(&self) -> usize {
        self.epochs
            .iter()
            .map(|e| e.peak_in_flight)
            .max()
            .unwrap_or_default()
    }

    pub fn timed_out_epochs(&self) -> usize {
        self.epochs.iter().filter(|e| e.timed_out).count()
    }
}
