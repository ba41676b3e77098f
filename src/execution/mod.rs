mod gate;
mod job;
mod occupancy;
mod pool;

pub use gate::{AdmissionGate, Permit};
pub use job::{Job, WorkSource};
pub use occupancy::{Occupancy, OccupancyGuard};
pub use pool::{PoolReport, WorkerPool};
