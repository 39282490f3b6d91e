//! Shared contract between the shard trainers, the merge engine and the verifier.
//!
//! Everything that crosses a process boundary lives here: the parameter snapshot
//! files written to the shared data directory and the JSON records printed on
//! standard output.

mod error;
pub mod handoff;
pub mod layout;
pub mod snapshot;
pub mod tensor;

pub use error::{HandoffErr, Result, SnapshotErr};
pub use handoff::{MergeRecord, MergeStatus, TrainingRecord, TrainingStatus};
pub use layout::DataDir;
pub use snapshot::Snapshot;
pub use tensor::{Tensor, TensorStats};
