use std::{cell::RefCell, rc::Rc};

use rand::rngs::StdRng;

use super::dot;
use crate::{
    Trained,
    data::Rating,
    error::{Result, TrainErr, UnitErr, non_negative, positive},
    evaluation::Regressor,
    initialization::{self, ParamGen, RandParamGen},
    training::Objective,
};

/// Latent factor model of a rating matrix.
///
/// Every user and item id owns a row of `factors` values; user rows come
/// first, then item rows. A rating is estimated as the dot product of the
/// user's and the item's rows.
#[derive(Debug, Clone)]
pub struct Factorization {
    users: usize,
    items: usize,
    factors: usize,
    learning_rate: f32,
    regularization: f32,
}

impl Factorization {
    /// The largest parameter buffer a model may ask for.
    pub const MAX_PARAMS: usize = 1 << 28;

    /// Creates a new `Factorization`.
    ///
    /// # Arguments
    /// * `users` - The amount of user rows, ids must be below it.
    /// * `items` - The amount of item rows, ids must be below it.
    /// * `factors` - The dimension of the latent space.
    /// * `learning_rate` - The step size of every update.
    /// * `regularization` - The weight of the L2 penalty on the factors.
    ///
    /// # Returns
    /// A new `Factorization` or an error if a size is zero, the rows need more
    /// than `MAX_PARAMS` parameters or a hyperparameter is invalid.
    pub fn new(
        users: usize,
        items: usize,
        factors: usize,
        learning_rate: f32,
        regularization: f32,
    ) -> Result<Self> {
        for (what, n) in [("users", users), ("items", items), ("factors", factors)] {
            if n == 0 {
                return Err(TrainErr::EmptyModel { what });
            }
        }

        users
            .checked_add(items)
            .and_then(|rows| rows.checked_mul(factors))
            .filter(|&n| n <= Self::MAX_PARAMS)
            .ok_or(TrainErr::TooManyParams {
                limit: Self::MAX_PARAMS,
            })?;

        Ok(Self {
            users,
            items,
            factors,
            learning_rate: positive("learning_rate", learning_rate)?,
            regularization: non_negative("regularization", regularization)?,
        })
    }

    /// Sizes the model to fit every id in `ratings`.
    pub fn for_ratings(
        ratings: &[Rating],
        factors: usize,
        learning_rate: f32,
        regularization: f32,
    ) -> Result<Self> {
        let users = rows_for(ratings.iter().map(|r| r.user))?;
        let items = rows_for(ratings.iter().map(|r| r.item))?;
        Self::new(users, items, factors, learning_rate, regularization)
    }

    pub fn users(&self) -> usize {
        self.users
    }

    pub fn items(&self) -> usize {
        self.items
    }

    pub fn factors(&self) -> usize {
        self.factors
    }

    /// The estimated rating of `item` by `user`.
    ///
    /// # Returns
    /// `None` if either id has no row.
    pub fn estimate(&self, params: &[f32], user: usize, item: usize) -> Option<f32> {
        if user >= self.users || item >= self.items {
            return None;
        }

        let (p, q) = params.split_at(self.users * self.factors);
        Some(dot(self.row(p, user), self.row(q, item)))
    }

    fn row<'a>(&self, rows: &'a [f32], id: usize) -> &'a [f32] {
        &rows[id * self.factors..(id + 1) * self.factors]
    }

    fn rows_mut<'a>(
        &self,
        params: &'a mut [f32],
        user: usize,
        item: usize,
    ) -> (&'a mut [f32], &'a mut [f32]) {
        let k = self.factors;
        let (p, q) = params.split_at_mut(self.users * k);
        (&mut p[user * k..(user + 1) * k], &mut q[item * k..(item + 1) * k])
    }
}

/// The amount of rows needed to hold every id.
fn rows_for(mut ids: impl Iterator<Item = usize>) -> Result<usize> {
    ids.try_fold(0, |rows, id| id.checked_add(1).map(|n| rows.max(n)))
        .ok_or(TrainErr::TooManyParams {
            limit: Factorization::MAX_PARAMS,
        })
}

impl Objective for Factorization {
    type Item = Rating;

    fn size(&self) -> usize {
        (self.users + self.items) * self.factors
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn param_gen(&self, rng: Rc<RefCell<StdRng>>) -> initialization::Result<Box<dyn ParamGen>> {
        Ok(Box::new(RandParamGen::uniform(rng, self.size(), 0., 1.)?))
    }

    fn check(&self, rating: &Rating) -> std::result::Result<(), UnitErr> {
        if rating.user >= self.users {
            return Err(UnitErr::OutOfRange {
                what: "user",
                got: rating.user,
                limit: self.users,
            });
        }

        if rating.item >= self.items {
            return Err(UnitErr::OutOfRange {
                what: "item",
                got: rating.item,
                limit: self.items,
            });
        }

        if !rating.value.is_finite() {
            return Err(UnitErr::NonFinite { index: 0 });
        }

        Ok(())
    }

    /// Walks the factors in order, each item factor sees the user factor already updated.
    fn step(&self, params: &mut [f32], rating: &Rating) {
        let (a, l) = (self.learning_rate, self.regularization);
        let (p, q) = self.rows_mut(params, rating.user, rating.item);
        let err = rating.value - dot(p, q);

        for (p_k, q_k) in p.iter_mut().zip(q.iter_mut()) {
            *p_k += a * (err * *q_k - l * *p_k);
            *q_k += a * (err * *p_k - l * *q_k);
        }
    }

    fn accumulate(&self, params: &[f32], rating: &Rating, grad: &mut [f32]) {
        let l = self.regularization;
        let (ps, qs) = params.split_at(self.users * self.factors);
        let (p, q) = (self.row(ps, rating.user), self.row(qs, rating.item));
        let err = rating.value - dot(p, q);

        let (g_p, g_q) = self.rows_mut(grad, rating.user, rating.item);
        for (((g_p, g_q), p_k), q_k) in g_p.iter_mut().zip(g_q.iter_mut()).zip(p).zip(q) {
            *g_p -= err * q_k - l * p_k;
            *g_q -= err * p_k - l * q_k;
        }
    }
}

impl Trained<Factorization> {
    /// The estimated rating of `item` by `user`.
    ///
    /// # Returns
    /// `None` if either id wasn't seen at training time.
    pub fn predict(&self, user: usize, item: usize) -> Option<f32> {
        self.objective().estimate(self.params(), user, item)
    }
}

impl Regressor for Trained<Factorization> {
    type Sample = Rating;

    fn estimate(&self, rating: &Rating) -> Option<f32> {
        self.predict(rating.user, rating.item)
    }

    fn observed(rating: &Rating) -> f32 {
        rating.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Factorization {
        Factorization::new(3, 2, 2, 0.1, 0.).unwrap()
    }

    #[test]
    fn sized_from_ratings() {
        let ratings = [Rating::new(1, 4, 3.), Rating::new(7, 0, 1.)];
        let model = Factorization::for_ratings(&ratings, 10, 0.01, 0.02).unwrap();

        assert_eq!(model.users(), 8);
        assert_eq!(model.items(), 5);
        assert_eq!(model.size(), (8 + 5) * 10);
        assert!(Factorization::for_ratings(&[], 10, 0.01, 0.02).is_err());
    }

    #[test]
    fn huge_ids_are_rejected_before_allocating() {
        let overflowing = [Rating::new(usize::MAX, 0, 1.)];
        assert!(matches!(
            Factorization::for_ratings(&overflowing, 10, 0.01, 0.02),
            Err(TrainErr::TooManyParams { .. })
        ));

        let huge = [Rating::new(0, 100_000_000_000, 1.)];
        assert!(matches!(
            Factorization::for_ratings(&huge, 10, 0.01, 0.02),
            Err(TrainErr::TooManyParams { .. })
        ));

        assert!(matches!(
            Factorization::new(usize::MAX, 1, 1, 0.01, 0.02),
            Err(TrainErr::TooManyParams { .. })
        ));
        assert!(matches!(
            Factorization::new(usize::MAX / 2, 2, 2, 0.01, 0.02),
            Err(TrainErr::TooManyParams { .. })
        ));
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let model = model();

        assert!(model.check(&Rating::new(2, 1, 1.)).is_ok());
        assert_eq!(
            model.check(&Rating::new(3, 1, 1.)),
            Err(UnitErr::OutOfRange {
                what: "user",
                got: 3,
                limit: 3
            })
        );
        assert!(model.check(&Rating::new(0, 2, 1.)).is_err());
        assert!(model.check(&Rating::new(0, 0, f32::NAN)).is_err());
        assert_eq!(model.estimate(&[0.; 10], 0, 2), None);
    }

    #[test]
    fn step_moves_towards_the_rating() {
        let model = model();
        let mut params = vec![0.5; model.size()];
        let rating = Rating::new(1, 1, 4.);

        let before = model.estimate(&params, 1, 1).unwrap();
        model.step(&mut params, &rating);
        let after = model.estimate(&params, 1, 1).unwrap();

        assert!((4. - after).abs() < (4. - before).abs());
        // Only the rows of the rated pair change.
        assert_eq!(&params[..2], &[0.5, 0.5]);
    }

    #[test]
    fn gradient_only_touches_the_rated_rows() {
        let model = model();
        let params = vec![0.5; model.size()];
        let mut grad = vec![0.; model.size()];

        model.accumulate(&params, &Rating::new(2, 0, 1.5), &mut grad);

        // err = 1.5 - 0.5 = 1, every touched entry is -(1 * 0.5).
        assert_eq!(grad, [0., 0., 0., 0., -0.5, -0.5, -0.5, -0.5, 0., 0.]);
    }
}
