use std::{
    cell::RefCell,
    error::Error,
    fmt::{self, Display},
    rc::Rc,
};

use rand::Rng;
use rand_distr::{Distribution, Uniform, uniform::Error as UniformError};

use super::ParamGen;

/// The specific result type for the `RandParamGen` constructors.
pub type Result<T> = std::result::Result<T, RandErr>;

/// Error returned when a `RandParamGen` distribution can't be built from its bounds.
#[derive(Debug)]
pub struct RandErr(String);

impl From<UniformError> for RandErr {
    fn from(value: UniformError) -> Self {
        Self(value.to_string())
    }
}

impl Display for RandErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for RandErr {}

/// A parameter generator that follows a certain probabilistic distribution.
///
/// Several generators can share one rng so a chain of them draws from a single stream.
pub struct RandParamGen<R: Rng, D: Distribution<f32>> {
    rng: Rc<RefCell<R>>,
    distribution: D,
    remaining: usize,
}

impl<R: Rng, D: Distribution<f32>> RandParamGen<R, D> {
    /// Creates a new `RandParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `rng` - A shared random number generator.
    /// * `distribution` - The distribution to sample the random numbers from.
    /// * `limit` - The total amount of numbers to generate.
    pub fn new(rng: Rc<RefCell<R>>, distribution: D, limit: usize) -> Self {
        Self {
            rng,
            distribution,
            remaining: limit,
        }
    }
}

impl<R: Rng> RandParamGen<R, Uniform<f32>> {
    /// Creates a new `RandParamGen` parameter generator with a uniform distribution.
    ///
    /// # Arguments
    /// * `rng` - A shared random number generator.
    /// * `limit` - The total amount of numbers to generate.
    /// * `low` - The inclusive lower limit.
    /// * `high` - The exclusive upper limit.
    ///
    /// # Returns
    /// An error if the range is empty or not finite.
    pub fn uniform(rng: Rc<RefCell<R>>, limit: usize, low: f32, high: f32) -> Result<Self> {
        Ok(Self::new(rng, Uniform::new(low, high)?, limit))
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<R, D> {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let n = n.min(self.remaining);

        if n == 0 {
            return None;
        }

        self.remaining -= n;

        let mut rng = self.rng.borrow_mut();
        Some((0..n).map(|_| self.distribution.sample(&mut *rng)).collect())
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn seeded_rng() -> Rc<RefCell<StdRng>> {
        Rc::new(RefCell::new(StdRng::seed_from_u64(42)))
    }

    #[test]
    fn samples_stay_in_range() {
        let mut param_gen = RandParamGen::uniform(seeded_rng(), 100, 0., 0.1).unwrap();
        let sample = param_gen.sample(100).unwrap();

        assert_eq!(sample.len(), 100);
        assert!(sample.iter().all(|&x| (0.0..0.1).contains(&x)));
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn same_seed_same_sample() {
        let mut a = RandParamGen::uniform(seeded_rng(), 8, 0., 1.).unwrap();
        let mut b = RandParamGen::uniform(seeded_rng(), 8, 0., 1.).unwrap();

        assert_eq!(a.sample(8), b.sample(8));
    }

    #[test]
    fn empty_range() {
        assert!(RandParamGen::uniform(seeded_rng(), 1, 1., 1.).is_err());
    }
}
