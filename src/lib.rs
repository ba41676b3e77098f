pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod execution;
pub mod initialization;
pub mod models;
pub mod optimization;
pub mod specs;
pub mod storage;
pub mod synchronization;
pub mod training;

pub use config::{Admission, Discipline, TrainerConfig};
pub use error::{Result, TrainErr, UnitErr};
pub use training::{Trained, Trainer};
