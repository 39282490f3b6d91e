pub mod config;
pub mod data;
pub mod error;
pub mod job;

pub use config::TrainerConfig;
pub use error::{PartitionErr, WorkerErr};
