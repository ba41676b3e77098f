mod ensemble;
mod grower;
mod tree;

pub use ensemble::{Forest, ForestBuilder, Label};
pub use tree::{Node, Tree};
