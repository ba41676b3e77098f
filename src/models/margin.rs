use std::{cell::RefCell, rc::Rc};

use rand::rngs::StdRng;

use super::dot;
use crate::{
    Trained,
    data::Example,
    error::{Result, TrainErr, UnitErr, check_features, non_negative, positive},
    evaluation::Classifier,
    initialization::{self, ConstParamGen, ParamGen},
    training::Objective,
};

/// A linear classifier trained on the L2 regularized hinge loss.
///
/// Parameters are the weights followed by the bias, all starting at zero.
#[derive(Debug, Clone)]
pub struct MarginClassifier {
    features: usize,
    learning_rate: f32,
    regularization: f32,
}

impl MarginClassifier {
    /// Creates a new `MarginClassifier`.
    ///
    /// # Arguments
    /// * `features` - The dimension of the feature vectors.
    /// * `learning_rate` - The step size of every update.
    /// * `regularization` - The weight of the L2 penalty on the weights.
    ///
    /// # Returns
    /// A new `MarginClassifier` or an error if a hyperparameter is invalid.
    pub fn new(features: usize, learning_rate: f32, regularization: f32) -> Result<Self> {
        if features == 0 {
            return Err(TrainErr::EmptyModel { what: "features" });
        }

        Ok(Self {
            features,
            learning_rate: positive("learning_rate", learning_rate)?,
            regularization: non_negative("regularization", regularization)?,
        })
    }

    pub fn features(&self) -> usize {
        self.features
    }

    /// The signed distance proxy `w·x + b`.
    pub fn score(&self, params: &[f32], features: &[f32]) -> f32 {
        let (w, b) = params.split_at(self.features);
        dot(w, features) + b[0]
    }
}

fn sign(label: bool) -> f32 {
    if label { 1. } else { -1. }
}

impl Objective for MarginClassifier {
    type Item = Example<bool>;

    fn size(&self) -> usize {
        self.features + 1
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn param_gen(&self, _rng: Rc<RefCell<StdRng>>) -> initialization::Result<Box<dyn ParamGen>> {
        Ok(Box::new(ConstParamGen::new(0., self.size())))
    }

    fn check(&self, item: &Example<bool>) -> std::result::Result<(), UnitErr> {
        check_features(&item.features, self.features)
    }

    fn step(&self, params: &mut [f32], item: &Example<bool>) {
        let y = sign(item.label);
        let margin = y * self.score(params, &item.features);
        let lr = self.learning_rate;
        let shrink = 1. - lr * self.regularization;

        let (w, b) = params.split_at_mut(self.features);

        if margin < 1. {
            for (w_j, x_j) in w.iter_mut().zip(&item.features) {
                *w_j = shrink * *w_j + lr * y * x_j;
            }
            b[0] += lr * y;
        } else {
            w.iter_mut().for_each(|w_j| *w_j *= shrink);
        }
    }

    fn accumulate(&self, params: &[f32], item: &Example<bool>, grad: &mut [f32]) {
        let y = sign(item.label);
        let margin = y * self.score(params, &item.features);
        let l = self.regularization;

        let (w, _) = params.split_at(self.features);
        let (g_w, g_b) = grad.split_at_mut(self.features);

        if margin < 1. {
            for ((g, w_j), x_j) in g_w.iter_mut().zip(w).zip(&item.features) {
                *g += l * w_j - y * x_j;
            }
            g_b[0] -= y;
        } else {
            for (g, w_j) in g_w.iter_mut().zip(w) {
                *g += l * w_j;
            }
        }
    }
}

impl Trained<MarginClassifier> {
    /// The raw score of `features`, positive on the `true` side.
    ///
    /// # Returns
    /// A `UnitErr` if `features` has the wrong dimension or isn't finite.
    pub fn predict(&self, features: &[f32]) -> std::result::Result<f32, UnitErr> {
        let model = self.objective();
        check_features(features, model.features)?;
        Ok(model.score(self.params(), features))
    }
}

impl Classifier for Trained<MarginClassifier> {
    type Label = bool;

    fn classify(&self, features: &[f32]) -> Option<bool> {
        self.predict(features).ok().map(|score| score >= 0.)
    }
}
