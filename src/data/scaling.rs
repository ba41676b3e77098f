use super::Example;

/// Rescales every feature to zero mean and unit variance.
///
/// Fitted on the training split and applied to both splits, so the test split
/// doesn't leak into the statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    means: Vec<f32>,
    std_devs: Vec<f32>,
}

impl Standardizer {
    /// Computes the per-feature statistics of `examples`.
    ///
    /// # Arguments
    /// * `examples` - Examples sharing the dimension of the first one, others are ignored.
    ///
    /// # Returns
    /// A new `Standardizer`, the identity if `examples` is empty.
    pub fn fit<L>(examples: &[Example<L>]) -> Self {
        let dim = examples.first().map_or(0, |e| e.features.len());
        let rows = examples.iter().filter(|e| e.features.len() == dim);

        let mut sums = vec![0f64; dim];
        let mut squares = vec![0f64; dim];
        let mut n = 0f64;

        for example in rows {
            n += 1.;
            for (i, &x) in example.features.iter().enumerate() {
                sums[i] += x as f64;
                squares[i] += (x as f64) * (x as f64);
            }
        }

        let n = n.max(1.);
        let means: Vec<_> = sums.iter().map(|s| s / n).collect();
        let std_devs = squares
            .iter()
            .zip(&means)
            .map(|(sq, m)| {
                let var = (sq / n - m * m).max(0.);
                match var.sqrt() as f32 {
                    sd if sd > f32::EPSILON => sd,
                    _ => 1.,
                }
            })
            .collect();

        Self {
            means: means.into_iter().map(|m| m as f32).collect(),
            std_devs,
        }
    }

    /// Rescales the features of `examples` in place.
    pub fn transform<L>(&self, examples: &mut [Example<L>]) {
        for example in examples {
            for ((x, m), sd) in example
                .features
                .iter_mut()
                .zip(&self.means)
                .zip(&self.std_devs)
            {
                *x = (*x - m) / sd;
            }
        }
    }
}
