//! Merging shard snapshots into a global model and verifying the result.

pub mod error;
pub mod merge;
pub mod verify;

pub use error::{MergeErr, Result};
pub use merge::{merge, merge_files, merge_to};
pub use verify::{
    Discrepancy, FailReason, Verdict, VerificationReport, VerifyOptions, verify, verify_paths,
};
