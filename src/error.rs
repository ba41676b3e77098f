use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use tokio::task::JoinError;

use crate::{initialization::RandErr, storage::SizeMismatchErr};

/// The result type for training runs.
pub type Result<T> = std::result::Result<T, TrainErr>;

/// Errors that abort a training run.
///
/// Every configuration variant is raised before a single worker is spawned.
#[derive(Debug)]
pub enum TrainErr {
    ZeroEpochs,
    ZeroWorkers,
    ZeroQueueDepth,
    ZeroTrees,
    EmptyModel {
        what: &'static str,
    },
    InvalidHyperparameter {
        name: &'static str,
        value: f32,
    },
    ParamCount {
        got: usize,
        expected: usize,
    },
    TooManyParams {
        limit: usize,
    },
    Rand(RandErr),
    SizeMismatch(SizeMismatchErr),
    Join(JoinError),
}

impl Display for TrainErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainErr::ZeroEpochs => f.write_str("the amount of epochs must be greater than zero"),
            TrainErr::ZeroWorkers => f.write_str("the amount of workers must be greater than zero"),
            TrainErr::ZeroQueueDepth => f.write_str("the work queue depth must be greater than zero"),
            TrainErr::ZeroTrees => f.write_str("the forest must have at least one tree"),
            TrainErr::EmptyModel { what } => write!(f, "the model has no {what}"),
            TrainErr::InvalidHyperparameter { name, value } => {
                write!(f, "invalid hyperparameter {name}: got {value}")
            }
            TrainErr::ParamCount { got, expected } => write!(
                f,
                "the parameter generator produced {got} parameters, expected {expected}"
            ),
            TrainErr::TooManyParams { limit } => {
                write!(f, "the model needs more than {limit} parameters")
            }
            TrainErr::Rand(e) => write!(f, "parameter initialization failed: {e}"),
            TrainErr::SizeMismatch(e) => write!(f, "{e}"),
            TrainErr::Join(e) => write!(f, "the training thread stopped: {e}"),
        }
    }
}

impl Error for TrainErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainErr::Rand(e) => Some(e),
            TrainErr::SizeMismatch(e) => Some(e),
            TrainErr::Join(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RandErr> for TrainErr {
    fn from(value: RandErr) -> Self {
        Self::Rand(value)
    }
}

impl From<JoinError> for TrainErr {
    fn from(value: JoinError) -> Self {
        Self::Join(value)
    }
}

impl From<SizeMismatchErr> for TrainErr {
    fn from(value: SizeMismatchErr) -> Self {
        Self::SizeMismatch(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<TrainErr> for io::Error {
    fn from(value: TrainErr) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, value)
    }
}

/// Checks that a hyperparameter is finite and strictly positive.
///
/// # Arguments
/// * `name` - The name of the hyperparameter, used for reporting.
/// * `value` - The value to check.
///
/// # Returns
/// The value or an `InvalidHyperparameter` error.
pub fn positive(name: &'static str, value: f32) -> Result<f32> {
    if value.is_finite() && value > 0. {
        Ok(value)
    } else {
        Err(TrainErr::InvalidHyperparameter { name, value })
    }
}

/// Checks that a hyperparameter is finite and not negative.
///
/// # Arguments
/// * `name` - The name of the hyperparameter, used for reporting.
/// * `value` - The value to check.
///
/// # Returns
/// The value or an `InvalidHyperparameter` error.
pub fn non_negative(name: &'static str, value: f32) -> Result<f32> {
    if value.is_finite() && value >= 0. {
        Ok(value)
    } else {
        Err(TrainErr::InvalidHyperparameter { name, value })
    }
}

/// A failure processing a single work unit.
///
/// These never abort a run: the unit is skipped, counted and logged, and its
/// contribution is dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitErr {
    DimensionMismatch {
        got: usize,
        expected: usize,
    },
    NonFinite {
        index: usize,
    },
    OutOfRange {
        what: &'static str,
        got: usize,
        limit: usize,
    },
    StaleEpoch {
        stamp: usize,
        current: usize,
    },
}

impl Display for UnitErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitErr::DimensionMismatch { got, expected } => {
                write!(f, "dimension mismatch: got {got}, expected {expected}")
            }
            UnitErr::NonFinite { index } => write!(f, "non finite value at position {index}"),
            UnitErr::OutOfRange { what, got, limit } => {
                write!(f, "{what} out of range: got {got}, limit {limit}")
            }
            UnitErr::StaleEpoch { stamp, current } => {
                write!(f, "unit stamped for epoch {stamp} but the clock is at {current}")
            }
        }
    }
}

impl Error for UnitErr {}

/// Checks a feature vector for dimension and finiteness.
///
/// # Arguments
/// * `features` - The feature vector.
/// * `expected` - The expected dimension.
///
/// # Returns
/// A `UnitErr` describing the first problem found.
pub fn check_features(features: &[f32], expected: usize) -> std::result::Result<(), UnitErr> {
    if features.len() != expected {
        return Err(UnitErr::DimensionMismatch {
            got: features.len(),
            expected,
        });
    }

    match features.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(UnitErr::NonFinite { index }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyperparameter_checks() {
        assert_eq!(positive("lr", 0.1).unwrap(), 0.1);
        assert!(positive("lr", 0.).is_err());
        assert!(positive("lr", f32::NAN).is_err());
        assert_eq!(non_negative("lambda", 0.).unwrap(), 0.);
        assert!(non_negative("lambda", -1.).is_err());
    }

    #[test]
    fn feature_checks() {
        assert!(check_features(&[1., 2.], 2).is_ok());
        assert_eq!(
            check_features(&[1.], 2),
            Err(UnitErr::DimensionMismatch {
                got: 1,
                expected: 2
            })
        );
        assert_eq!(
            check_features(&[1., f32::INFINITY], 2),
            Err(UnitErr::NonFinite { index: 1 })
        );
    }
}
