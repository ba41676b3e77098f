use super::ParamGen;

/// A parameter generator that always generates the same value.
pub struct ConstParamGen {
    value: f32,
    remaining: usize,
}

impl ConstParamGen {
    /// Creates a new `ConstParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `value` - The value to always generate.
    /// * `limit` - The total amount of values to generate.
    ///
    /// # Returns
    /// A new `ConstParamGen` instance.
    pub fn new(value: f32, limit: usize) -> Self {
        Self {
            value,
            remaining: limit,
        }
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let n = n.min(self.remaining);

        if n == 0 {
            return None;
        }

        self.remaining -= n;
        Some(vec![self.value; n])
    }
}
