use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

/// The result type used by the snapshot I/O contract.
pub type Result<T> = std::result::Result<T, SnapshotErr>;

/// Failures while building, reading or writing parameter snapshots.
#[derive(Debug)]
pub enum SnapshotErr {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Format {
        path: PathBuf,
        msg: String,
    },
    UnsupportedDtype {
        path: PathBuf,
        name: String,
        dtype: String,
    },
    MissingTensor {
        path: PathBuf,
        name: String,
    },
    Shape {
        name: String,
        msg: String,
    },
    DuplicateName(String),
}

impl Display for SnapshotErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotErr::Io { path, source } => {
                write!(f, "io error on {}: {source}", path.display())
            }
            SnapshotErr::Format { path, msg } => {
                write!(f, "invalid snapshot file {}: {msg}", path.display())
            }
            SnapshotErr::UnsupportedDtype { path, name, dtype } => write!(
                f,
                "tensor '{name}' in {} has unsupported dtype {dtype}",
                path.display()
            ),
            SnapshotErr::MissingTensor { path, name } => {
                write!(f, "tensor '{name}' not found in {}", path.display())
            }
            SnapshotErr::Shape { name, msg } => write!(f, "bad shape for '{name}': {msg}"),
            SnapshotErr::DuplicateName(name) => {
                write!(f, "parameter '{name}' appears more than once")
            }
        }
    }
}

impl Error for SnapshotErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SnapshotErr::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failures while reading a JSON record back from a process' standard output.
#[derive(Debug)]
pub enum HandoffErr {
    NoOutput,
    Json(serde_json::Error),
}

impl Display for HandoffErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoffErr::NoOutput => f.write_str("the process produced no output lines"),
            HandoffErr::Json(e) => write!(f, "the last output line is not a valid record: {e}"),
        }
    }
}

impl Error for HandoffErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HandoffErr::Json(e) => Some(e),
            HandoffErr::NoOutput => None,
        }
    }
}

impl From<serde_json::Error> for HandoffErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
