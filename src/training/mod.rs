mod jobs;
mod objective;
mod report;
mod trainer;

pub use objective::Objective;
pub use report::{EpochReport, TrainReport};
pub use trainer::{Trained, Trainer};
