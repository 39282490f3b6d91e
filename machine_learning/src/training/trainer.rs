use comms::Snapshot;

use super::{EpochReport, TrainMetrics};
use crate::Result;

/// The black box a shard job drives: train on the local shard, then hand back
/// the learned parameters as a named snapshot.
pub trait Trainer {
    /// Trains on the local data, calling `progress` after every epoch.
    fn train(&mut self, progress: &mut dyn FnMut(EpochReport)) -> Result<TrainMetrics>;

    /// The current parameters as a named snapshot.
    fn snapshot(&self) -> Result<Snapshot>;
}
