use std::path::{Path, PathBuf};

/// Data directory used when neither a flag nor the environment overrides it.
pub const DEFAULT_DATA_DIR: &str = "./raft-data";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "ORCHESTRA_DATA_DIR";

/// File extension of every persisted snapshot.
pub const SNAPSHOT_EXT: &str = "safetensors";

/// The shared directory where shard and global snapshots are stored.
///
/// Shard outputs are named `<job_id>_model.safetensors` and merged outputs
/// `<parent_id>_global.safetensors`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the snapshot produced by the shard job `job_id`.
    pub fn shard_model_path(&self, job_id: &str) -> PathBuf {
        self.root.join(format!("{job_id}_model.{SNAPSHOT_EXT}"))
    }

    /// Path of the merged snapshot for the parent job `parent_id`.
    pub fn global_model_path(&self, parent_id: &str) -> PathBuf {
        self.root.join(format!("{parent_id}_global.{SNAPSHOT_EXT}"))
    }
}

impl Default for DataDir {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_names_follow_job_ids() {
        let dir = DataDir::default();
        assert_eq!(
            dir.shard_model_path("job-1-node-2"),
            Path::new("./raft-data/job-1-node-2_model.safetensors")
        );
        assert_eq!(
            DataDir::new("/tmp/data").global_model_path("job-1"),
            Path::new("/tmp/data/job-1_global.safetensors")
        );
    }
}
