use std::{
    error::Error,
    fmt::{self, Display},
};

use comms::SnapshotErr;
use ndarray::ShapeError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    EmptyDataset,
    InvalidArch(String),
    InvalidLabel {
        row: usize,
        value: f32,
        classes: usize,
    },
    MissingParam(String),
    Shape(ShapeError),
    Snapshot(SnapshotErr),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(f, "size mismatch for {what}: got {got}, expected {expected}"),
            MlErr::EmptyDataset => f.write_str("the dataset has no samples"),
            MlErr::InvalidArch(msg) => write!(f, "invalid architecture: {msg}"),
            MlErr::InvalidLabel {
                row,
                value,
                classes,
            } => write!(
                f,
                "label {value} at row {row} is not a class index in [0, {classes})"
            ),
            MlErr::MissingParam(name) => write!(f, "parameter '{name}' is missing"),
            MlErr::Shape(e) => write!(f, "shape error: {e}"),
            MlErr::Snapshot(e) => write!(f, "{e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            MlErr::Snapshot(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<SnapshotErr> for MlErr {
    fn from(value: SnapshotErr) -> Self {
        Self::Snapshot(value)
    }
}
