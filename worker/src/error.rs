use std::{error::Error, fmt, io};

use comms::SnapshotErr;
use machine_learning::MlErr;

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Invalid shard descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionErr {
    InvalidPartition { index: usize, shards: usize },
    InvalidShardLabel(String),
}

impl fmt::Display for PartitionErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionErr::InvalidPartition { index, shards } => {
                write!(f, "invalid partition: shard {index} of {shards}")
            }
            PartitionErr::InvalidShardLabel(label) => write!(
                f,
                "invalid shard label {label:?}, expected node-<k> or a shard index"
            ),
        }
    }
}

impl Error for PartitionErr {}

/// Shard job failures.
#[derive(Debug)]
pub enum WorkerErr {
    Io(io::Error),
    Partition(PartitionErr),
    Ml(MlErr),
    Snapshot(SnapshotErr),
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerErr::Io(e) => write!(f, "io error: {e}"),
            WorkerErr::Partition(e) => e.fmt(f),
            WorkerErr::Ml(e) => write!(f, "training error: {e}"),
            WorkerErr::Snapshot(e) => write!(f, "snapshot error: {e}"),
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::Io(e) => Some(e),
            WorkerErr::Partition(e) => Some(e),
            WorkerErr::Ml(e) => Some(e),
            WorkerErr::Snapshot(e) => Some(e),
        }
    }
}

impl From<io::Error> for WorkerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<PartitionErr> for WorkerErr {
    fn from(value: PartitionErr) -> Self {
        Self::Partition(value)
    }
}

impl From<MlErr> for WorkerErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

impl From<SnapshotErr> for WorkerErr {
    fn from(value: SnapshotErr) -> Self {
        Self::Snapshot(value)
    }
}
