use std::{
    any::Any,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, anyhow};
use clap::Parser;
use comms::{
    DataDir, TrainingRecord, TrainingStatus,
    handoff,
    layout::{DATA_DIR_ENV, DEFAULT_DATA_DIR},
};
use log::{error, info};
use machine_learning::training::{ActFnSpec, LossFnSpec, OptimizerSpec, TrainerSpec};

use worker::{
    TrainerConfig,
    config::DEFAULT_DATASET,
    data::ShardSpec,
    job,
};

/// Trains the model on one shard of the dataset and reports the outcome as the
/// last line of stdout.
#[derive(Parser, Debug)]
#[command(name = "train")]
struct Cli {
    /// Job identifier, names the output snapshot
    job_id: String,

    /// Shard of this job, `node-<k>` (1-based) or a 0-based index
    #[arg(long, alias = "shard_index", default_value = "node-1")]
    shard_index: String,

    /// Total number of shards the dataset is split into
    #[arg(long, alias = "total_shards", default_value_t = 1)]
    total_shards: usize,

    /// Safetensors file holding the `x` and `y` tensors of the full dataset
    #[arg(long, default_value = DEFAULT_DATASET)]
    dataset: PathBuf,

    /// Layer widths, input first and output last
    #[arg(long, value_delimiter = ',', default_values_t = [784, 128, 64, 10])]
    layers: Vec<usize>,

    #[arg(long, default_value = "1")]
    epochs: NonZeroUsize,

    #[arg(long, default_value = "64")]
    batch_size: NonZeroUsize,

    #[arg(long, default_value_t = 0.001)]
    learning_rate: f32,

    /// Seed for weight initialization and shuffling
    #[arg(long)]
    seed: Option<u64>,

    /// Directory where snapshots are stored
    #[arg(long, env = DATA_DIR_ENV, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Snapshot to start from instead of a fresh initialization
    #[arg(long)]
    init_from: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> anyhow::Result<TrainerConfig> {
        let total_shards = NonZeroUsize::new(self.total_shards)
            .ok_or_else(|| anyhow!("total shards must be at least 1"))?;
        let shard = ShardSpec::from_label(&self.shard_index, total_shards)?;

        let trainer = TrainerSpec {
            layers: self.layers.clone(),
            act_fn: ActFnSpec::Relu,
            optimizer: OptimizerSpec::Adam {
                learning_rate: self.learning_rate,
            },
            loss: LossFnSpec::CrossEntropy,
            epochs: self.epochs,
            batch_size: self.batch_size,
            seed: self.seed,
        };

        let config = TrainerConfig::new(
            &self.job_id,
            shard,
            &self.dataset,
            DataDir::new(&self.data_dir),
            trainer,
        );

        Ok(match &self.init_from {
            Some(path) => config.with_init_from(path),
            None => config,
        })
    }
}

fn train(cli: &Cli) -> anyhow::Result<TrainingRecord> {
    let config = cli.config()?;
    let record = job::run(&config, handoff::progress)
        .with_context(|| format!("job {} failed", config.job_id()))?;

    Ok(record)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panic: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panic: {msg}")
    } else {
        "panic".to_string()
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    info!("starting job {}", cli.job_id);

    let record = match panic::catch_unwind(AssertUnwindSafe(|| train(&cli))) {
        Ok(Ok(record)) => record,
        Ok(Err(e)) => {
            error!("{e:#}");
            TrainingRecord::failed(cli.job_id.clone(), format!("{e:#}"))
        }
        Err(payload) => {
            let msg = panic_message(payload);
            error!("job {} {msg}", cli.job_id);
            TrainingRecord::failed(cli.job_id.clone(), msg)
        }
    };

    if let Err(e) = handoff::emit(&record) {
        error!("failed to write the result record: {e}");
        return ExitCode::FAILURE;
    }

    match record.status {
        TrainingStatus::Completed => ExitCode::SUCCESS,
        TrainingStatus::Failed => ExitCode::FAILURE,
    }
}
