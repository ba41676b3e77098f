use super::Optimizer;
use crate::storage::{Result, SizeMismatchErr};

/// Plain gradient descent, `p -= lr * g`.
#[derive(Debug)]
pub struct GradientDescent {
    learning_rate: f32,
}

impl GradientDescent {
    /// Creates a new `GradientDescent` optimizer.
    ///
    /// # Arguments
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    ///
    /// # Returns
    /// A new `GradientDescent` instance.
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for GradientDescent {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        SizeMismatchErr::check(grad.len(), params.len())?;

        let lr = self.learning_rate;
        params.iter_mut().zip(grad).for_each(|(p, g)| *p -= lr * g);
        Ok(())
    }
}

/// Gradient descent that keeps a velocity across epochs.
#[derive(Debug)]
pub struct GradientDescentWithMomentum {
    learning_rate: f32,
    momentum: f32,
    velocity: Box<[f32]>,
}

impl GradientDescentWithMomentum {
    /// Creates a new `GradientDescentWithMomentum` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `momentum` - The fraction of the previous velocity kept on every update.
    ///
    /// # Returns
    /// A new `GradientDescentWithMomentum` instance.
    pub fn new(len: usize, learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: vec![0.; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for GradientDescentWithMomentum {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        SizeMismatchErr::check(grad.len(), params.len())?;
        SizeMismatchErr::check(self.velocity.len(), params.len())?;

        let (lr, mu) = (self.learning_rate, self.momentum);

        for ((p, g), v) in params.iter_mut().zip(grad).zip(self.velocity.iter_mut()) {
            *v = mu * *v + g;
            *p -= lr * *v;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descent_moves_against_the_gradient() {
        let mut optimizer = GradientDescent::new(0.5);
        let mut params = [1., 1., 1.];

        optimizer.update_params(&[2., 0., -2.], &mut params).unwrap();
        assert_eq!(params, [0., 1., 2.]);
    }

    #[test]
    fn momentum_accumulates_velocity() {
        let mut optimizer = GradientDescentWithMomentum::new(1, 1., 0.5);
        let mut params = [0.];

        optimizer.update_params(&[1.], &mut params).unwrap();
        assert_eq!(params, [-1.]);

        optimizer.update_params(&[1.], &mut params).unwrap();
        assert_eq!(params, [-2.5]);
    }

    #[test]
    fn size_mismatch() {
        let mut optimizer = GradientDescent::new(1.);
        let err = optimizer.update_params(&[1.], &mut [0., 0.]).unwrap_err();

        assert_eq!(
            err,
            SizeMismatchErr {
                got: 1,
                expected: 2
            }
        );
    }
}
