//! The trainable model behind a shard job.
//!
//! The merge and verification side never looks inside this crate: a shard job
//! only needs something implementing [`training::Trainer`] that turns a data
//! shard into a named parameter [`comms::Snapshot`] plus scalar metrics.

pub mod arch;
pub mod dataset;
pub mod error;
pub mod initialization;
pub mod optimization;
mod test;
pub mod training;

pub use error::{MlErr, Result};
