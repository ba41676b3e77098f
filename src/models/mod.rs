mod factorization;
pub mod forest;
mod margin;
mod network;

pub use factorization::Factorization;
pub use forest::{Forest, ForestBuilder};
pub use margin::MarginClassifier;
pub use network::NeuralNetwork;

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
