use std::{cell::RefCell, rc::Rc};

use rand::rngs::StdRng;

use crate::{
    error::UnitErr,
    initialization::{ParamGen, Result},
};

/// A model trained one work unit at a time over a flat parameter buffer.
///
/// The model itself only holds hyperparameters and the layout of its
/// parameters; the parameters live in the trainer's store.
pub trait Objective: Send + Sync + 'static {
    type Item: Send + Sync + 'static;

    /// The amount of parameters of the model.
    fn size(&self) -> usize;

    /// The step size for per-unit updates, also the default for merged ones.
    fn learning_rate(&self) -> f32;

    /// Builds the generator of the initial parameters.
    ///
    /// # Arguments
    /// * `rng` - The seeded random number generator of the run.
    ///
    /// # Returns
    /// A generator of exactly `size()` parameters or a `RandErr`.
    fn param_gen(&self, rng: Rc<RefCell<StdRng>>) -> Result<Box<dyn ParamGen>>;

    /// Validates a work unit before it touches any buffer.
    ///
    /// # Returns
    /// A `UnitErr` if the unit must be skipped.
    fn check(&self, item: &Self::Item) -> std::result::Result<(), UnitErr>;

    /// Updates `params` in place with a single unit.
    ///
    /// Only called with units that passed `check`.
    fn step(&self, params: &mut [f32], item: &Self::Item);

    /// Adds the loss gradient of a single unit, evaluated at `params`, into `grad`.
    ///
    /// Only called with units that passed `check`.
    fn accumulate(&self, params: &[f32], item: &Self::Item, grad: &mut [f32]);
}
