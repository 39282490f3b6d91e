use std::path::PathBuf;

use comms::DataDir;
use machine_learning::training::TrainerSpec;

use crate::data::ShardSpec;

/// Default location of the full training dataset.
pub const DEFAULT_DATASET: &str = "./data/dataset.safetensors";

/// Everything a single shard training job needs.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    job_id: String,
    shard: ShardSpec,
    dataset: PathBuf,
    data_dir: DataDir,
    init_from: Option<PathBuf>,
    trainer: TrainerSpec,
}

impl TrainerConfig {
    /// Creates a new job configuration.
    ///
    /// # Args
    /// * `job_id` - Opaque identifier of the job, it names the output snapshot.
    /// * `shard` - The part of the dataset this job trains on.
    /// * `dataset` - Path to the full dataset.
    /// * `data_dir` - Where the shard snapshot gets written.
    /// * `trainer` - Model and optimization hyper-parameters.
    pub fn new(
        job_id: impl Into<String>,
        shard: ShardSpec,
        dataset: impl Into<PathBuf>,
        data_dir: DataDir,
        trainer: TrainerSpec,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            shard,
            dataset: dataset.into(),
            data_dir,
            init_from: None,
            trainer,
        }
    }

    /// Starts training from a previously saved snapshot, usually the last global model.
    pub fn with_init_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.init_from = Some(path.into());
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn shard(&self) -> ShardSpec {
        self.shard
    }

    pub fn dataset(&self) -> &PathBuf {
        &self.dataset
    }

    pub fn data_dir(&self) -> &DataDir {
        &self.data_dir
    }

    pub fn init_from(&self) -> Option<&PathBuf> {
        self.init_from.as_ref()
    }

    pub fn trainer(&self) -> &TrainerSpec {
        &self.trainer
    }

    /// Where this job's snapshot is written.
    pub fn model_path(&self) -> PathBuf {
        self.data_dir.shard_model_path(&self.job_id)
    }
}
