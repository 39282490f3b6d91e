//! Machine-readable records exchanged with the orchestrator over standard output.
//!
//! A tool may print any number of progress lines, but the last non-empty line it
//! writes is the authoritative JSON record.

use std::io::{self, Write};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::HandoffErr;

/// The status of a finished merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStatus {
    Merged,
}

/// The record printed once per successful merge invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub parent_id: String,
    pub status: MergeStatus,
    pub model_path: String,
    pub num_models: usize,
}

impl MergeRecord {
    pub fn merged<S: Into<String>>(parent_id: S, model_path: S, num_models: usize) -> Self {
        Self {
            parent_id: parent_id.into(),
            status: MergeStatus::Merged,
            model_path: model_path.into(),
            num_models,
        }
    }
}

/// The outcome of a shard training job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainingStatus {
    Completed,
    Failed,
}

/// The record printed as the last line of a shard training job.
///
/// Completed jobs carry `accuracy`, `loss` and `model_path`; failed jobs carry
/// `error`. Absent fields are omitted from the JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub job_id: String,
    pub status: TrainingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrainingRecord {
    pub fn completed<S: Into<String>>(job_id: S, accuracy: f64, loss: f64, model_path: S) -> Self {
        Self {
            job_id: job_id.into(),
            status: TrainingStatus::Completed,
            accuracy: Some(accuracy),
            loss: Some(loss),
            model_path: Some(model_path.into()),
            error: None,
        }
    }

    pub fn failed<S: Into<String>>(job_id: S, error: S) -> Self {
        Self {
            job_id: job_id.into(),
            status: TrainingStatus::Failed,
            accuracy: None,
            loss: None,
            model_path: None,
            error: Some(error.into()),
        }
    }
}

/// Writes `record` as a single JSON line and flushes the writer.
pub fn emit_to<W: Write, T: Serialize>(mut w: W, record: &T) -> io::Result<()> {
    let line = serde_json::to_string(record)?;
    writeln!(w, "{line}")?;
    w.flush()
}

/// Writes `record` as a single JSON line on standard output.
pub fn emit<T: Serialize>(record: &T) -> io::Result<()> {
    emit_to(io::stdout().lock(), record)
}

/// Prints a progress line on standard output and flushes it right away so log
/// followers observe it in real time.
pub fn progress(line: &str) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{line}")?;
    out.flush()
}

/// Parses the authoritative record out of a process' standard output.
///
/// # Errors
/// `HandoffErr::NoOutput` if there are no non-empty lines and
/// `HandoffErr::Json` if the last one isn't a `T`.
pub fn parse_last_line<T: DeserializeOwned>(output: &str) -> Result<T, HandoffErr> {
    let last = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .ok_or(HandoffErr::NoOutput)?;

    Ok(serde_json::from_str(last)?)
}
