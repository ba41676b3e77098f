use std::{cell::RefCell, rc::Rc};

use rand::rngs::StdRng;

use super::dot;
use crate::{
    Trained,
    data::Example,
    error::{Result, TrainErr, UnitErr, check_features, positive},
    evaluation::Classifier,
    initialization::{self, ChainedParamGen, ParamGen, RandParamGen},
    training::Objective,
};

/// A fully connected network with one sigmoid hidden layer and one sigmoid output.
///
/// Parameters are laid out as the input to hidden weights (one row per hidden
/// unit), the hidden to output weights, the hidden biases and the output bias.
#[derive(Debug, Clone)]
pub struct NeuralNetwork {
    inputs: usize,
    hidden: usize,
    learning_rate: f32,
}

impl NeuralNetwork {
    /// Creates a new `NeuralNetwork`.
    ///
    /// # Arguments
    /// * `inputs` - The dimension of the feature vectors.
    /// * `hidden` - The amount of hidden units.
    /// * `learning_rate` - The step size of every update.
    ///
    /// # Returns
    /// A new `NeuralNetwork` or an error if any size is zero or the learning rate isn't positive.
    pub fn new(inputs: usize, hidden: usize, learning_rate: f32) -> Result<Self> {
        if inputs == 0 {
            return Err(TrainErr::EmptyModel { what: "inputs" });
        }

        if hidden == 0 {
            return Err(TrainErr::EmptyModel {
                what: "hidden units",
            });
        }

        Ok(Self {
            inputs,
            hidden,
            learning_rate: positive("learning_rate", learning_rate)?,
        })
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn hidden(&self) -> usize {
        self.hidden
    }

    /// The output activation for `features`, in `(0, 1)`.
    ///
    /// # Arguments
    /// * `params` - The parameters of the network.
    /// * `features` - A feature vector of `inputs` values.
    pub fn output(&self, params: &[f32], features: &[f32]) -> f32 {
        let mut hidden = vec![0.; self.hidden];
        self.forward(params, features, &mut hidden)
    }

    fn forward(&self, params: &[f32], x: &[f32], hidden: &mut [f32]) -> f32 {
        let (w_ih, w_ho, b_h, b_o) = self.views(params);

        for ((h, row), b) in hidden
            .iter_mut()
            .zip(w_ih.chunks_exact(self.inputs))
            .zip(b_h)
        {
            *h = sigmoid(b + dot(row, x));
        }

        sigmoid(b_o + dot(w_ho, hidden))
    }

    fn views<'a>(&self, params: &'a [f32]) -> (&'a [f32], &'a [f32], &'a [f32], f32) {
        let (w_ih, rest) = params.split_at(self.inputs * self.hidden);
        let (w_ho, rest) = rest.split_at(self.hidden);
        let (b_h, b_o) = rest.split_at(self.hidden);
        (w_ih, w_ho, b_h, b_o[0])
    }

    #[allow(clippy::type_complexity)]
    fn views_mut<'a>(
        &self,
        params: &'a mut [f32],
    ) -> (&'a mut [f32], &'a mut [f32], &'a mut [f32], &'a mut f32) {
        let (w_ih, rest) = params.split_at_mut(self.inputs * self.hidden);
        let (w_ho, rest) = rest.split_at_mut(self.hidden);
        let (b_h, b_o) = rest.split_at_mut(self.hidden);
        (w_ih, w_ho, b_h, &mut b_o[0])
    }
}

fn sigmoid(z: f32) -> f32 {
    1. / (1. + (-z).exp())
}

/// The derivative of the sigmoid in terms of its output.
fn sigmoid_slope(y: f32) -> f32 {
    y * (1. - y)
}

fn target(label: bool) -> f32 {
    if label { 1. } else { 0. }
}

impl Objective for NeuralNetwork {
    type Item = Example<bool>;

    fn size(&self) -> usize {
        self.inputs * self.hidden + 2 * self.hidden + 1
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn param_gen(&self, rng: Rc<RefCell<StdRng>>) -> initialization::Result<Box<dyn ParamGen>> {
        let weights = self.size() - 1;
        let param_gens: Vec<Box<dyn ParamGen>> = vec![
            Box::new(RandParamGen::uniform(Rc::clone(&rng), weights, 0., 0.1)?),
            Box::new(RandParamGen::uniform(rng, 1, 0., 1.)?),
        ];

        Ok(Box::new(ChainedParamGen::new(param_gens)))
    }

    fn check(&self, item: &Example<bool>) -> std::result::Result<(), UnitErr> {
        check_features(&item.features, self.inputs)
    }

    /// Backpropagates one example; the hidden deltas use the freshly updated output weights.
    fn step(&self, params: &mut [f32], item: &Example<bool>) {
        let x = &item.features;
        let mut hidden = vec![0.; self.hidden];

        let out = self.forward(params, x, &mut hidden);
        let delta = (target(item.label) - out) * sigmoid_slope(out);
        let lr = self.learning_rate;

        let (w_ih, w_ho, b_h, b_o) = self.views_mut(params);

        for (w, h) in w_ho.iter_mut().zip(&hidden) {
            *w += lr * delta * h;
        }
        *b_o += lr * delta;

        for (((row, b), w), h) in w_ih
            .chunks_exact_mut(self.inputs)
            .zip(b_h.iter_mut())
            .zip(w_ho.iter())
            .zip(&hidden)
        {
            let hidden_delta = delta * w * sigmoid_slope(*h);
            for (w_ij, x_j) in row.iter_mut().zip(x) {
                *w_ij += lr * hidden_delta * x_j;
            }
            *b += lr * hidden_delta;
        }
    }

    fn accumulate(&self, params: &[f32], item: &Example<bool>, grad: &mut [f32]) {
        let x = &item.features;
        let mut hidden = vec![0.; self.hidden];

        let out = self.forward(params, x, &mut hidden);
        let delta = (target(item.label) - out) * sigmoid_slope(out);

        let (_, w_ho, _, _) = self.views(params);
        let (g_ih, g_ho, g_bh, g_bo) = self.views_mut(grad);

        for (g, h) in g_ho.iter_mut().zip(&hidden) {
            *g -= delta * h;
        }
        *g_bo -= delta;

        for (((g_row, g_b), w), h) in g_ih
            .chunks_exact_mut(self.inputs)
            .zip(g_bh.iter_mut())
            .zip(w_ho)
            .zip(&hidden)
        {
            let hidden_delta = delta * w * sigmoid_slope(*h);
            for (g, x_j) in g_row.iter_mut().zip(x) {
                *g -= hidden_delta * x_j;
            }
            *g_b -= hidden_delta;
        }
    }
}

impl Trained<NeuralNetwork> {
    /// The output activation for `features`, in `(0, 1)`.
    ///
    /// # Returns
    /// A `UnitErr` if `features` has the wrong dimension or isn't finite.
    pub fn predict(&self, features: &[f32]) -> std::result::Result<f32, UnitErr> {
        let network = self.objective();
        check_features(features, network.inputs)?;
        Ok(network.output(self.params(), features))
    }
}

impl Classifier for Trained<NeuralNetwork> {
    type Label = bool;

    fn classify(&self, features: &[f32]) -> Option<bool> {
        self.predict(features).ok().map(|out| out > 0.5)
    }
}
