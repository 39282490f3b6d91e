use std::{
    error::Error,
    fmt::{self, Display},
};

use comms::SnapshotErr;

/// The aggregator module's result type.
pub type Result<T> = std::result::Result<T, MergeErr>;

/// Reasons a set of snapshots can't be merged.
#[derive(Debug)]
pub enum MergeErr {
    EmptyMergeSet,
    /// Snapshot `index` doesn't have the same parameter names as the first one.
    SchemaMismatch {
        index: usize,
        missing: Vec<String>,
        extra: Vec<String>,
    },
    ShapeMismatch {
        name: String,
        index: usize,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    Snapshot(SnapshotErr),
}

impl Display for MergeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeErr::EmptyMergeSet => f.write_str("no snapshots to merge"),
            MergeErr::SchemaMismatch {
                index,
                missing,
                extra,
            } => write!(
                f,
                "snapshot {index} doesn't match the parameters of snapshot 0: missing {missing:?}, extra {extra:?}"
            ),
            MergeErr::ShapeMismatch {
                name,
                index,
                expected,
                got,
            } => write!(
                f,
                "parameter '{name}' of snapshot {index} has shape {got:?}, expected {expected:?}"
            ),
            MergeErr::Snapshot(e) => write!(f, "{e}"),
        }
    }
}

impl Error for MergeErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MergeErr::Snapshot(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SnapshotErr> for MergeErr {
    fn from(value: SnapshotErr) -> Self {
        Self::Snapshot(value)
    }
}
