mod error;
pub mod loaders;
mod scaling;
pub mod synthetic;

use rand::Rng;

pub use error::{DataErr, Result};
pub use scaling::Standardizer;

/// A labeled feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Example<L> {
    pub features: Vec<f32>,
    pub label: L,
}

impl<L> Example<L> {
    pub fn new(features: Vec<f32>, label: L) -> Self {
        Self { features, label }
    }
}

/// A user's rating of an item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rating {
    pub user: usize,
    pub item: usize,
    pub value: f32,
    pub timestamp: i64,
}

impl Rating {
    pub fn new(user: usize, item: usize, value: f32) -> Self {
        Self {
            user,
            item,
            value,
            timestamp: 0,
        }
    }
}

/// Splits `items` in two without shuffling.
///
/// # Arguments
/// * `items` - The whole dataset.
/// * `ratio` - The fraction that goes to the first part, clamped to `[0, 1]`.
///
/// # Returns
/// The first `floor(ratio * len)` items and the rest.
pub fn split<T>(items: &[T], ratio: f64) -> (&[T], &[T]) {
    let at = (items.len() as f64 * ratio.clamp(0., 1.)) as usize;
    items.split_at(at.min(items.len()))
}

/// Draws `items.len()` items with replacement.
///
/// # Arguments
/// * `items` - The population.
/// * `rng` - A random number generator.
///
/// # Returns
/// References into `items`, possibly repeated.
pub fn bootstrap<'a, T, R: Rng + ?Sized>(items: &'a [T], rng: &mut R) -> Vec<&'a T> {
    if items.is_empty() {
        return Vec::new();
    }

    (0..items.len())
        .map(|_| &items[rng.random_range(0..items.len())])
        .collect()
}
