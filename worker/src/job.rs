use std::io;

use comms::{TrainingRecord, snapshot};
use log::{info, warn};
use machine_learning::{dataset::Dataset, training::TrainerBuilder};

use crate::{config::TrainerConfig, data::Shard, error::Result};

/// Runs one shard training job end to end.
///
/// Loads the dataset, keeps the rows owned by the configured shard, trains on them
/// and persists the resulting snapshot under the data directory. Human readable
/// progress goes through `progress`, the returned record is the job's outcome.
///
/// # Errors
/// Any failure loading, training or persisting; the caller turns it into a
/// failed record.
pub fn run<P>(config: &TrainerConfig, mut progress: P) -> Result<TrainingRecord>
where
    P: FnMut(&str) -> io::Result<()>,
{
    let shard = config.shard();
    let mut say = |line: String| {
        if let Err(e) = progress(&line) {
            warn!("failed to write progress: {e}");
        }
    };

    say(format!("Starting training for job: {}", config.job_id()));
    say(format!(
        "Shard {}/{}",
        shard.shard_index() + 1,
        shard.total_shards()
    ));

    let dataset = Dataset::load(config.dataset())?;
    let range = shard.range(dataset.len());
    say(format!(
        "Dataset shard: {} to {} ({} samples)",
        range.start,
        range.end,
        range.len()
    ));

    let dataset = dataset.shard(shard)?;
    info!(job_id = config.job_id(), samples = dataset.len(); "dataset sharded");

    let init = match config.init_from() {
        Some(path) => {
            info!("initializing from {}", path.display());
            Some(snapshot::load(path)?)
        }
        None => None,
    };

    let mut trainer = TrainerBuilder::new().build(config.trainer(), dataset, init.as_ref())?;
    let job_id = config.job_id();
    let metrics = trainer.train(&mut |report| {
        say(format!(
            "Job {job_id} - Epoch {}/{} - Loss: {:.4}",
            report.epoch, report.epochs, report.loss
        ))
    })?;

    let model_path = config.model_path();
    snapshot::save(&trainer.snapshot()?, &model_path)?;
    info!(
        job_id = job_id, loss = metrics.loss, accuracy = metrics.accuracy;
        "shard model saved to {}", model_path.display()
    );

    Ok(TrainingRecord::completed(
        job_id.to_string(),
        metrics.accuracy,
        metrics.loss,
        model_path.display().to_string(),
    ))
}
