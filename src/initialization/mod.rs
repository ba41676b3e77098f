mod chained;
mod constant;
mod random;

use std::time::{SystemTime, UNIX_EPOCH};

pub use chained::ChainedParamGen;
pub use constant::ConstParamGen;
pub use random::{RandErr, RandParamGen, Result};

/// A `ParamGen` generates values for the initial state of the model's parameters.
pub trait ParamGen {
    /// Should sample at most `n` parameters.
    ///
    /// # Arguments
    /// * `n` - The upper limit of samples to generate.
    ///
    /// # Returns
    /// `None` once the generator is exhausted.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;
}

impl<P: ParamGen + ?Sized> ParamGen for Box<P> {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        (**self).sample(n)
    }
}

/// Draws up to `n` parameters from `param_gen`, calling it as many times as needed.
///
/// # Arguments
/// * `param_gen` - The generator to exhaust.
/// * `n` - The amount of parameters wanted.
///
/// # Returns
/// The drawn parameters, shorter than `n` if the generator ran out.
pub fn draw<P: ParamGen + ?Sized>(param_gen: &mut P, n: usize) -> Vec<f32> {
    let mut params = Vec::with_capacity(n);

    while params.len() < n {
        match param_gen.sample(n - params.len()) {
            Some(sample) if !sample.is_empty() => params.extend(sample),
            _ => break,
        }
    }

    params
}

/// Derives a seed from the wall clock, runs seeded this way are not reproducible.
pub fn seed_from_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}
