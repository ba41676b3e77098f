use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    config::{Admission, Discipline, TrainerConfig},
    data::Rating,
    error::{Result, TrainErr},
    models::{Factorization, ForestBuilder, MarginClassifier, NeuralNetwork},
};

/// The specification for the `Optimizer` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    GradientDescent { learning_rate: f32 },
    GradientDescentWithMomentum { learning_rate: f32, momentum: f32 },
}

fn default_queue_depth() -> usize {
    TrainerConfig::DEFAULT_QUEUE_DEPTH.get()
}

/// The specification for the `Trainer` struct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainerSpec {
    pub epochs: usize,
    pub workers: usize,
    #[serde(default)]
    pub discipline: Discipline,
    #[serde(default)]
    pub admission: Admission,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub optimizer: Option<OptimizerSpec>,
}

impl TrainerSpec {
    /// A spec with every optional field at its default.
    pub fn new(epochs: usize, workers: usize) -> Self {
        Self {
            epochs,
            workers,
            discipline: Discipline::default(),
            admission: Admission::default(),
            queue_depth: default_queue_depth(),
            deadline_ms: None,
            seed: None,
            optimizer: None,
        }
    }
}

impl TryFrom<TrainerSpec> for TrainerConfig {
    type Error = TrainErr;

    fn try_from(spec: TrainerSpec) -> Result<Self> {
        TrainerConfig::new(spec.epochs, spec.workers)?
            .with_discipline(spec.discipline)
            .with_admission(spec.admission)
            .with_queue_depth(spec.queue_depth)?
            .with_deadline(spec.deadline_ms.map(Duration::from_millis))
            .with_seed(spec.seed)
            .with_optimizer(spec.optimizer)
    }
}

/// The specification for the `NeuralNetwork` model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub inputs: usize,
    pub hidden: usize,
    pub learning_rate: f32,
}

impl NetworkSpec {
    pub fn build(&self) -> Result<NeuralNetwork> {
        NeuralNetwork::new(self.inputs, self.hidden, self.learning_rate)
    }
}

/// The specification for the `MarginClassifier` model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginSpec {
    pub features: usize,
    pub learning_rate: f32,
    pub regularization: f32,
}

impl MarginSpec {
    pub fn build(&self) -> Result<MarginClassifier> {
        MarginClassifier::new(self.features, self.learning_rate, self.regularization)
    }
}

/// The specification for the `Factorization` model, sized from the ratings it trains on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorizationSpec {
    pub factors: usize,
    pub learning_rate: f32,
    pub regularization: f32,
}

impl FactorizationSpec {
    pub fn build(&self, ratings: &[Rating]) -> Result<Factorization> {
        Factorization::for_ratings(
            ratings,
            self.factors,
            self.learning_rate,
            self.regularization,
        )
    }
}

/// The specification for the `ForestBuilder` struct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestSpec {
    pub trees: usize,
    pub max_depth: usize,
    pub workers: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl TryFrom<ForestSpec> for ForestBuilder {
    type Error = TrainErr;

    fn try_from(spec: ForestSpec) -> Result<Self> {
        Ok(ForestBuilder::new(spec.trees, spec.max_depth, spec.workers)?.with_seed(spec.seed))
    }
}

/// A model specification together with the bounds of its training runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSpec<S> {
    pub model: S,
    pub trainer: TrainerSpec,
}

/// Where the labeled examples come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetSpec {
    Synthetic {
        records: usize,
        features: usize,
        noise: f32,
    },
    Census {
        path: PathBuf,
        #[serde(default)]
        augment_to: Option<usize>,
    },
}

/// Where the ratings come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingsSpec {
    Synthetic {
        users: usize,
        items: usize,
        ratings: usize,
    },
    File {
        path: PathBuf,
    },
}

/// Everything the demo binary runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSpec {
    pub seed: Option<u64>,
    /// The fraction of every dataset used for training, the rest is for testing.
    pub split: f64,
    pub dataset: DatasetSpec,
    pub ratings: RatingsSpec,
    pub network: RunSpec<NetworkSpec>,
    pub factorization: RunSpec<FactorizationSpec>,
    pub margin: RunSpec<MarginSpec>,
    pub forest: ForestSpec,
}

impl Default for ExperimentSpec {
    fn default() -> Self {
        Self {
            seed: Some(42),
            split: 0.8,
            dataset: DatasetSpec::Synthetic {
                records: 2000,
                features: 6,
                noise: 1.,
            },
            ratings: RatingsSpec::Synthetic {
                users: 200,
                items: 300,
                ratings: 20_000,
            },
            network: RunSpec {
                model: NetworkSpec {
                    inputs: 6,
                    hidden: 10,
                    learning_rate: 0.01,
                },
                trainer: TrainerSpec::new(50, 4),
            },
            factorization: RunSpec {
                model: FactorizationSpec {
                    factors: 10,
                    learning_rate: 0.01,
                    regularization: 0.02,
                },
                trainer: TrainerSpec::new(50, 4),
            },
            margin: RunSpec {
                model: MarginSpec {
                    features: 6,
                    learning_rate: 0.001,
                    regularization: 0.01,
                },
                trainer: TrainerSpec::new(100, 4),
            },
            forest: ForestSpec {
                trees: 10,
                max_depth: 5,
                workers: 4,
                seed: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trainer_spec_defaults() {
        let spec: TrainerSpec = serde_json::from_str(r#"{ "epochs": 3, "workers": 2 }"#).unwrap();
        assert_eq!(spec, TrainerSpec::new(3, 2));

        let config = TrainerConfig::try_from(spec).unwrap();
        assert_eq!(config.epochs(), 3);
        assert_eq!(config.discipline(), Discipline::DirectWrite);
        assert_eq!(config.queue_depth(), TrainerConfig::DEFAULT_QUEUE_DEPTH);
    }

    #[test]
    fn trainer_spec_full() {
        let json = r#"{
            "epochs": 5,
            "workers": 8,
            "discipline": "accumulate_merge",
            "admission": "fan_out",
            "queue_depth": 16,
            "deadline_ms": 250,
            "seed": 7,
            "optimizer": { "gradient_descent_with_momentum": { "learning_rate": 0.1, "momentum": 0.9 } }
        }"#;

        let config = TrainerConfig::try_from(serde_json::from_str::<TrainerSpec>(json).unwrap())
            .unwrap();

        assert_eq!(config.workers().get(), 8);
        assert_eq!(config.admission(), Admission::FanOut);
        assert_eq!(config.queue_depth().get(), 16);
        assert_eq!(config.deadline(), Some(Duration::from_millis(250)));
        assert_eq!(config.seed(), Some(7));
    }

    #[test]
    fn invalid_trainer_specs() {
        assert!(matches!(
            TrainerConfig::try_from(TrainerSpec::new(0, 4)),
            Err(TrainErr::ZeroEpochs)
        ));

        let mut spec = TrainerSpec::new(1, 4);
        spec.queue_depth = 0;
        assert!(matches!(
            TrainerConfig::try_from(spec),
            Err(TrainErr::ZeroQueueDepth)
        ));
    }

    #[test]
    fn experiment_round_trips_through_json() {
        let spec = ExperimentSpec::default();
        let json = serde_json::to_string(&spec).unwrap();

        assert_eq!(serde_json::from_str::<ExperimentSpec>(&json).unwrap(), spec);
        assert!(spec.network.model.build().is_ok());
        assert!(spec.margin.model.build().is_ok());
        assert!(ForestBuilder::try_from(spec.forest).is_ok());
    }

    #[test]
    fn census_dataset_spec() {
        let json = r#"{ "census": { "path": "adult.data", "augment_to": 100000 } }"#;

        assert_eq!(
            serde_json::from_str::<DatasetSpec>(json).unwrap(),
            DatasetSpec::Census {
                path: PathBuf::from("adult.data"),
                augment_to: Some(100_000)
            }
        );
    }
}
