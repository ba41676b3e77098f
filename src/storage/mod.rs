mod accumulating;
mod direct;
mod error;

pub use accumulating::{AccumulatingStore, LocalAccumulators};
pub use direct::DirectStore;
pub use error::{Result, SizeMismatchErr};
