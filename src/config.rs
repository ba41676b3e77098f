use std::{num::NonZeroUsize, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, TrainErr, positive},
    specs::OptimizerSpec,
};

/// The way concurrent contributions reach the shared parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    /// Every unit is applied in order on the calling task, no pool involved.
    Sequential,
    /// Every unit locks the parameters, updates them in place and releases.
    #[default]
    DirectWrite,
    /// Every worker sums into a local buffer, merges it once and the
    /// orchestrator applies the merged gradient once per epoch.
    AccumulateMerge,
}

/// The way work units are admitted into the worker pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// A fixed set of workers drains a shared bounded queue.
    #[default]
    Pull,
    /// Every unit runs on its own task after acquiring a gate permit.
    FanOut,
}

/// Immutable execution bounds for a training run.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    epochs: NonZeroUsize,
    workers: NonZeroUsize,
    discipline: Discipline,
    admission: Admission,
    queue_depth: NonZeroUsize,
    deadline: Option<Duration>,
    seed: Option<u64>,
    optimizer: Option<OptimizerSpec>,
}

impl TrainerConfig {
    /// The default depth of the pull queue.
    pub const DEFAULT_QUEUE_DEPTH: NonZeroUsize = NonZeroUsize::new(1024).unwrap();

    /// Creates a new trainer configuration.
    ///
    /// # Args
    /// * `epochs` - Number of passes over the work source.
    /// * `workers` - Upper bound of concurrently executing units.
    ///
    /// # Returns
    /// A `TrainerConfig` instance or an error if any bound is zero.
    pub fn new(epochs: usize, workers: usize) -> Result<Self> {
        let epochs = NonZeroUsize::new(epochs).ok_or(TrainErr::ZeroEpochs)?;
        let workers = NonZeroUsize::new(workers).ok_or(TrainErr::ZeroWorkers)?;

        Ok(Self {
            epochs,
            workers,
            discipline: Discipline::default(),
            admission: Admission::default(),
            queue_depth: Self::DEFAULT_QUEUE_DEPTH,
            deadline: None,
            seed: None,
            optimizer: None,
        })
    }

    pub fn with_discipline(mut self, discipline: Discipline) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_admission(mut self, admission: Admission) -> Self {
        self.admission = admission;
        self
    }

    /// Sets the capacity of the pull queue.
    ///
    /// # Returns
    /// The updated configuration or an error if `queue_depth` is zero.
    pub fn with_queue_depth(mut self, queue_depth: usize) -> Result<Self> {
        self.queue_depth = NonZeroUsize::new(queue_depth).ok_or(TrainErr::ZeroQueueDepth)?;
        Ok(self)
    }

    /// Bounds the wall time of every epoch, late contributions are dropped.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the optimizer used to apply merged gradients.
    ///
    /// # Returns
    /// The updated configuration or an error if its hyperparameters are invalid.
    pub fn with_optimizer(mut self, optimizer: Option<OptimizerSpec>) -> Result<Self> {
        if let Some(spec) = optimizer {
            match spec {
                OptimizerSpec::GradientDescent { learning_rate } => {
                    positive("learning_rate", learning_rate)?;
                }
                OptimizerSpec::GradientDescentWithMomentum {
                    learning_rate,
                    momentum,
                } => {
                    positive("learning_rate", learning_rate)?;
                    if !(0.0..1.0).contains(&momentum) {
                        return Err(TrainErr::InvalidHyperparameter {
                            name: "momentum",
                            value: momentum,
                        });
                    }
                }
            }
        }

        self.optimizer = optimizer;
        Ok(self)
    }

    pub fn epochs(&self) -> usize {
        self.epochs.get()
    }

    pub fn workers(&self) -> NonZeroUsize {
        self.workers
    }

    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    pub fn admission(&self) -> Admission {
        self.admission
    }

    pub fn queue_depth(&self) -> NonZeroUsize {
        self.queue_depth
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn optimizer(&self) -> Option<OptimizerSpec> {
        self.optimizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bounds_fail_fast() {
        assert!(matches!(TrainerConfig::new(0, 4), Err(TrainErr::ZeroEpochs)));
        assert!(matches!(TrainerConfig::new(1, 0), Err(TrainErr::ZeroWorkers)));

        let config = TrainerConfig::new(1, 1).unwrap();
        assert!(matches!(
            config.with_queue_depth(0),
            Err(TrainErr::ZeroQueueDepth)
        ));
    }

    #[test]
    fn defaults() {
        let config = TrainerConfig::new(3, 2).unwrap();

        assert_eq!(config.epochs(), 3);
        assert_eq!(config.workers().get(), 2);
        assert_eq!(config.discipline(), Discipline::DirectWrite);
        assert_eq!(config.admission(), Admission::Pull);
        assert_eq!(config.queue_depth(), TrainerConfig::DEFAULT_QUEUE_DEPTH);
        assert!(config.deadline().is_none());
    }

    #[test]
    fn invalid_optimizer_is_rejected() {
        let config = TrainerConfig::new(1, 1).unwrap();
        let spec = OptimizerSpec::GradientDescentWithMomentum {
            learning_rate: 0.1,
            momentum: 1.5,
        };

        assert!(config.with_optimizer(Some(spec)).is_err());
    }
}
