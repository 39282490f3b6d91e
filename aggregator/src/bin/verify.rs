use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use aggregator::{FailReason, Verdict, VerificationReport, VerifyOptions};
use clap::Parser;
use comms::{
    DataDir, Snapshot, TensorStats,
    layout::{DATA_DIR_ENV, DEFAULT_DATA_DIR},
};
use log::error;

const DEFAULT_PARENT: &str = "test-federated";
const DEFAULT_SHARDS: usize = 3;
const PREVIEW_LEN: usize = 5;
const PREVIEW_SHARDS: usize = 3;
const RULE_WIDTH: usize = 60;

/// Checks that a global snapshot is the parameter-wise average of its shards.
#[derive(Parser, Debug)]
#[command(name = "verify")]
struct Cli {
    /// Global snapshot, defaults to `<data-dir>/test-federated_global.safetensors`
    global: Option<PathBuf>,

    /// Shard snapshots, default to `<data-dir>/test-federated-node-{1,2,3}_model.safetensors`
    shards: Vec<PathBuf>,

    /// How many parameters, in key order, are recomputed
    #[arg(long, default_value_t = VerifyOptions::default().sample_limit)]
    sample_limit: usize,

    /// Largest absolute difference still considered equal
    #[arg(long, default_value_t = VerifyOptions::default().tolerance)]
    tolerance: f64,

    /// Directory where snapshots are stored
    #[arg(long, env = DATA_DIR_ENV, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,
}

impl Cli {
    fn paths(&self) -> (PathBuf, Vec<PathBuf>) {
        let data_dir = DataDir::new(&self.data_dir);
        let global = self
            .global
            .clone()
            .unwrap_or_else(|| data_dir.global_model_path(DEFAULT_PARENT));

        let shards = if self.shards.is_empty() {
            (1..=DEFAULT_SHARDS)
                .map(|k| data_dir.shard_model_path(&format!("{DEFAULT_PARENT}-node-{k}")))
                .collect()
        } else {
            self.shards.clone()
        };

        (global, shards)
    }
}

fn rule() {
    println!("{}", "=".repeat(RULE_WIDTH));
}

fn preview(tensor: &comms::Tensor) -> Vec<f32> {
    tensor.iter().take(PREVIEW_LEN).copied().collect()
}

fn inspect_first(global: &Snapshot) {
    let Some((name, tensor)) = global.iter().next() else {
        return;
    };

    println!("\nInspecting first parameter: '{name}'");
    println!("   Shape: {:?}", tensor.shape());
    if let Some(stats) = TensorStats::of(tensor) {
        println!("   Mean: {:.6}", stats.mean);
        println!("   Std: {:.6}", stats.std);
        println!("   Min: {:.6}", stats.min);
        println!("   Max: {:.6}", stats.max);
    }
}

fn print_samples(global: &Snapshot, shards: &[Snapshot]) {
    let Some((name, tensor)) = global.iter().next() else {
        return;
    };

    println!("\nSample values of '{name}' (first {PREVIEW_LEN}):");
    println!("   Global: {:?}", preview(tensor));
    for (i, shard) in shards.iter().take(PREVIEW_SHARDS).enumerate() {
        if let Some(tensor) = shard.get(name) {
            println!("   Shard {}: {:?}", i + 1, preview(tensor));
        }
    }
}

fn print_report(report: &VerificationReport, global: &Snapshot, shards: &[Snapshot]) {
    for path in &report.skipped {
        println!("Skipping missing shard: {}", path.display());
    }

    match report.verdict {
        Verdict::Failed(FailReason::NoShards) => {
            println!("No shard models found!");
            return;
        }
        _ => println!(
            "Loaded global model and {} shard models",
            report.shards_used
        ),
    }

    println!("Found {} parameters in global model", global.len());
    inspect_first(global);

    if report.verdict == Verdict::Failed(FailReason::ZeroWeights) {
        println!("Global model weights are all zeros!");
        return;
    }
    println!("Global model weights are non-zero");

    println!("\nVerifying averaging across {} shards...", report.shards_used);
    match report.verdict {
        Verdict::Inconclusive => {
            println!("Could not verify averaging (no matching parameters)");
        }
        Verdict::Failed(FailReason::Discrepancies) => {
            println!(
                "Averaging verification failed for {} parameters:",
                report.discrepancies.len()
            );
            for d in &report.discrepancies {
                println!("   {}: max diff = {:.8}", d.name, d.max_abs_diff);
            }
        }
        _ => {
            println!(
                "Averaging verified correctly for {} parameters",
                report.checked_params
            );
            print_samples(global, shards);
        }
    }
}

fn run(global_path: &Path, shard_paths: &[PathBuf], options: &VerifyOptions) -> bool {
    println!("Loading models...");
    match aggregator::verify_paths(global_path, shard_paths, options) {
        Ok((global, shards, report)) => {
            print_report(&report, &global, &shards);
            report.passed()
        }
        Err(e) => {
            error!("failed to load the global model: {e}");
            println!("Model not found: {}", global_path.display());
            false
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    let (global, shards) = cli.paths();
    let options = VerifyOptions {
        sample_limit: cli.sample_limit,
        tolerance: cli.tolerance,
    };

    rule();
    println!("Federated Model Verification");
    rule();
    println!("Global model: {}", global.display());
    println!("Shard models: {} files", shards.len());
    println!();

    let passed = run(&global, &shards, &options);

    println!();
    rule();
    if passed {
        println!("VERIFICATION PASSED");
    } else {
        println!("VERIFICATION FAILED");
    }
    rule();

    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
