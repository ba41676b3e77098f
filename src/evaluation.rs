use rayon::prelude::*;

use crate::data::Example;

/// A frozen model that labels feature vectors.
pub trait Classifier: Sync {
    type Label: PartialEq + Send + Sync;

    /// Labels `features`.
    ///
    /// # Returns
    /// `None` if the model can't label the input.
    fn classify(&self, features: &[f32]) -> Option<Self::Label>;
}

/// A frozen model that estimates a numeric target.
pub trait Regressor: Sync {
    type Sample: Sync;

    /// Estimates the target of `sample`.
    ///
    /// # Returns
    /// `None` if the model knows nothing about the sample.
    fn estimate(&self, sample: &Self::Sample) -> Option<f32>;

    /// The observed target of `sample`.
    fn observed(sample: &Self::Sample) -> f32;
}

/// The fraction of `test` that `model` labels right.
///
/// # Returns
/// `None` for an empty test set.
pub fn accuracy<C: Classifier>(model: &C, test: &[Example<C::Label>]) -> Option<f32> {
    if test.is_empty() {
        return None;
    }

    let correct = test
        .par_iter()
        .filter(|example| model.classify(&example.features).as_ref() == Some(&example.label))
        .count();

    Some(correct as f32 / test.len() as f32)
}

/// The mean squared error of `model` over the samples it can estimate.
///
/// # Returns
/// `None` if `model` can't estimate any sample of `test`.
pub fn mean_squared_error<R: Regressor>(model: &R, test: &[R::Sample]) -> Option<f32> {
    let (sum, n) = test
        .par_iter()
        .filter_map(|sample| {
            let estimate = model.estimate(sample)?;
            let err = (R::observed(sample) - estimate) as f64;
            Some((err * err, 1usize))
        })
        .reduce(|| (0., 0), |(s1, n1), (s2, n2)| (s1 + s2, n1 + n2));

    (n > 0).then(|| (sum / n as f64) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Threshold;

    impl Classifier for Threshold {
        type Label = bool;

        fn classify(&self, features: &[f32]) -> Option<bool> {
            features.first().map(|&x| x > 0.)
        }
    }

    struct Constant;

    impl Regressor for Constant {
        type Sample = (bool, f32);

        fn estimate(&self, sample: &(bool, f32)) -> Option<f32> {
            sample.0.then_some(1.)
        }

        fn observed(sample: &(bool, f32)) -> f32 {
            sample.1
        }
    }

    #[test]
    fn accuracy_counts_matches() {
        let test = [
            Example::new(vec![1.], true),
            Example::new(vec![-1.], false),
            Example::new(vec![1.], false),
            Example::new(vec![], true),
        ];

        assert_eq!(accuracy(&Threshold, &test), Some(0.5));
        assert_eq!(accuracy(&Threshold, &[]), None);
    }

    #[test]
    fn mse_skips_unknown_samples() {
        let test = [(true, 3.), (true, 1.), (false, 100.)];

        assert_eq!(mean_squared_error(&Constant, &test), Some(2.));
        assert_eq!(mean_squared_error(&Constant, &[(false, 1.)]), None);
    }
}
