use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type of the dataset loaders.
pub type Result<T> = std::result::Result<T, DataErr>;

/// Dataset loading failures.
#[derive(Debug)]
pub enum DataErr {
    Io(io::Error),
    NoRecords,
}

impl Display for DataErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataErr::Io(e) => write!(f, "io error: {e}"),
            DataErr::NoRecords => f.write_str("the dataset has no valid records"),
        }
    }
}

impl Error for DataErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DataErr::Io(e) => Some(e),
            DataErr::NoRecords => None,
        }
    }
}

impl From<io::Error> for DataErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<DataErr> for io::Error {
    fn from(value: DataErr) -> Self {
        match value {
            DataErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
