use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comms::{
    DataDir, MergeRecord, handoff,
    layout::{DATA_DIR_ENV, DEFAULT_DATA_DIR},
};

/// Averages shard snapshots into a global snapshot and prints the merge record.
#[derive(Parser, Debug)]
#[command(name = "merge")]
struct Cli {
    /// Parent job id, names the global snapshot
    parent_id: String,

    /// Shard snapshots to average
    #[arg(long, num_args = 1.., required = true)]
    models: Vec<PathBuf>,

    /// Output path, defaults to `<data-dir>/<parent_id>_global.safetensors`
    #[arg(long)]
    out: Option<PathBuf>,

    /// Directory where snapshots are stored
    #[arg(long, env = DATA_DIR_ENV, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let out = cli
        .out
        .unwrap_or_else(|| DataDir::new(&cli.data_dir).global_model_path(&cli.parent_id));

    aggregator::merge_to(&cli.models, &out).with_context(|| {
        format!(
            "failed to merge {} models for {}",
            cli.models.len(),
            cli.parent_id
        )
    })?;

    let record = MergeRecord::merged(cli.parent_id, out.display().to_string(), cli.models.len());
    handoff::emit(&record)?;
    Ok(())
}
