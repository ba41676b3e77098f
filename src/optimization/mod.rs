mod descent;

pub use descent::{GradientDescent, GradientDescentWithMomentum};

pub use crate::storage::SizeMismatchErr;

use crate::{specs::OptimizerSpec, storage::Result};

/// Defines the strategy for applying a merged gradient to the model parameters.
pub trait Optimizer {
    /// Updates `params` using the merged gradient of one epoch.
    ///
    /// # Arguments
    /// * `grad` - The gradient of the loss, parameters move against it.
    /// * `params` - The parameters to update.
    ///
    /// # Returns
    /// An error if there's a mismatch in the sizes of `grad` and `params`.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()>;
}

impl<O: Optimizer + ?Sized> Optimizer for Box<O> {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        (**self).update_params(grad, params)
    }
}

/// Resolves the optimizer for a model.
///
/// # Arguments
/// * `spec` - The configured optimizer, if any.
/// * `learning_rate` - The model's own learning rate, used when `spec` is absent.
/// * `len` - The amount of parameters of the model.
///
/// # Returns
/// A boxed optimizer, plain gradient descent by default.
pub fn resolve(
    spec: Option<OptimizerSpec>,
    learning_rate: f32,
    len: usize,
) -> Box<dyn Optimizer + Send> {
    match spec {
        None => Box::new(GradientDescent::new(learning_rate)),
        Some(OptimizerSpec::GradientDescent { learning_rate }) => {
            Box::new(GradientDescent::new(learning_rate))
        }
        Some(OptimizerSpec::GradientDescentWithMomentum {
            learning_rate,
            momentum,
        }) => Box::new(GradientDescentWithMomentum::new(len, learning_rate, momentum)),
    }
}
