//! Generated datasets with a known structure, for demos and tests.

use rand::Rng;
use rand_distr::{Distribution, Normal, StandardNormal};

use super::{Example, Rating};

/// Examples labeled by a fixed hyperplane through the origin plus gaussian noise.
///
/// Features are standard normal. The hyperplane weighs even features `1` and
/// odd ones `-0.5`, so no linear model gets every label right once `noise > 0`.
///
/// # Arguments
/// * `records` - The amount of examples.
/// * `features` - The dimension of the feature vectors.
/// * `noise` - The standard deviation of the noise added to the score.
/// * `rng` - A random number generator.
///
/// # Returns
/// Examples labeled `true` when their noisy score is positive.
pub fn noisy_hyperplane<R: Rng + ?Sized>(
    records: usize,
    features: usize,
    noise: f32,
    rng: &mut R,
) -> Vec<Example<bool>> {
    let weights: Vec<f32> = (0..features)
        .map(|i| if i % 2 == 0 { 1. } else { -0.5 })
        .collect();

    let noise = Normal::<f32>::new(0., noise.abs()).ok();

    (0..records)
        .map(|_| {
            let x: Vec<f32> = (0..features).map(|_| StandardNormal.sample(rng)).collect();
            let score: f32 = x.iter().zip(&weights).map(|(x, w)| x * w).sum();
            let jitter = noise.as_ref().map_or(0., |n| n.sample(rng));

            Example::new(x, score + jitter > 0.)
        })
        .collect()
}

/// Ratings drawn from hidden user and item factors.
///
/// Ids start at `1`, as in common rating dumps. Values are integers in `[1, 5]`.
///
/// # Arguments
/// * `users` - The amount of users.
/// * `items` - The amount of items.
/// * `count` - The amount of ratings, the same pair may be rated twice.
/// * `rng` - A random number generator.
///
/// # Returns
/// The generated ratings.
pub fn low_rank_ratings<R: Rng + ?Sized>(
    users: usize,
    items: usize,
    count: usize,
    rng: &mut R,
) -> Vec<Rating> {
    const RANK: usize = 3;

    if users == 0 || items == 0 {
        return Vec::new();
    }

    let mut hidden = |n: usize| -> Vec<[f32; RANK]> {
        (0..n)
            .map(|_| std::array::from_fn(|_| rng.random_range(0.0..1.0)))
            .collect()
    };

    let user_factors = hidden(users);
    let item_factors = hidden(items);

    (0..count)
        .map(|i| {
            let user = rng.random_range(0..users);
            let item = rng.random_range(0..items);

            let affinity: f32 = user_factors[user]
                .iter()
                .zip(&item_factors[item])
                .map(|(u, v)| u * v)
                .sum();

            let scaled = (2. * affinity / RANK as f32).min(1.);
            let jitter = rng.random_range(-0.5..0.5);
            let value = (1. + 4. * scaled + jitter).round().clamp(1., 5.);

            Rating {
                user: user + 1,
                item: item + 1,
                value,
                timestamp: i as i64,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn hyperplane_is_balanced() {
        let mut rng = StdRng::seed_from_u64(1);
        let examples = noisy_hyperplane(2000, 6, 1., &mut rng);

        assert_eq!(examples.len(), 2000);
        assert!(examples.iter().all(|e| e.features.len() == 6));

        let positives = examples.iter().filter(|e| e.label).count();
        assert!((800..1200).contains(&positives));
    }

    #[test]
    fn ratings_are_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let ratings = low_rank_ratings(10, 20, 500, &mut rng);

        assert_eq!(ratings.len(), 500);
        assert!(ratings.iter().all(|r| (1..=10).contains(&r.user)));
        assert!(ratings.iter().all(|r| (1..=20).contains(&r.item)));
        assert!(ratings.iter().all(|r| (1.0..=5.0).contains(&r.value)));
    }
}
