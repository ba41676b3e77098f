use std::{
    error::Error,
    fmt::{self, Display},
};

/// The specific result type for size checks inside the storage and optimization modules.
pub type Result<T> = std::result::Result<T, SizeMismatchErr>;

/// Error returned whenever a gradient, the parameters and an external buffer
/// disagree on their length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeMismatchErr {
    pub got: usize,
    pub expected: usize,
}

impl SizeMismatchErr {
    /// Checks that two lengths match.
    ///
    /// # Arguments
    /// * `got` - The length of the provided buffer.
    /// * `expected` - The length the store or optimizer holds.
    pub fn check(got: usize, expected: usize) -> Result<()> {
        if got == expected {
            Ok(())
        } else {
            Err(Self { got, expected })
        }
    }
}

impl Display for SizeMismatchErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "buffer length mismatch: got {}, expected {}",
            self.got, self.expected
        )
    }
}

impl Error for SizeMismatchErr {}
