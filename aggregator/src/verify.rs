//! Checks that a global snapshot is the average of its shard snapshots.
//!
//! Only a prefix of the global parameters (`sample_limit` names in key order) is
//! recomputed, which keeps verification cheap on large models at the cost of
//! full coverage.

use std::path::{Path, PathBuf};

use comms::{Snapshot, Tensor, snapshot, tensor};
use log::warn;
use ndarray::{ArrayD, IxDyn};

/// Knobs of a verification run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifyOptions {
    /// How many parameters, in the global key order, are recomputed.
    pub sample_limit: usize,
    /// Largest absolute difference still considered equal.
    pub tolerance: f64,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            sample_limit: 5,
            tolerance: 1e-5,
        }
    }
}

/// Why a verification failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    NoShards,
    ZeroWeights,
    Discrepancies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    /// None of the sampled parameters was present in any shard.
    Inconclusive,
    Failed(FailReason),
}

/// A sampled parameter whose global value isn't the average of the shards.
#[derive(Debug, Clone, PartialEq)]
pub struct Discrepancy {
    pub name: String,
    /// Infinite when a shard tensor's shape differs from the global one.
    pub max_abs_diff: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub verdict: Verdict,
    pub discrepancies: Vec<Discrepancy>,
    pub shards_used: usize,
    pub checked_params: usize,
    /// Shard files that couldn't be loaded.
    pub skipped: Vec<PathBuf>,
}

impl VerificationReport {
    fn failed(reason: FailReason, shards_used: usize) -> Self {
        Self {
            verdict: Verdict::Failed(reason),
            discrepancies: Vec::new(),
            shards_used,
            checked_params: 0,
            skipped: Vec::new(),
        }
    }

    /// Whether the verification passed. An inconclusive verdict counts as a pass.
    pub fn passed(&self) -> bool {
        matches!(self.verdict, Verdict::Passed | Verdict::Inconclusive)
    }
}

/// Verifies `global` against the shard snapshots it was merged from.
pub fn verify(global: &Snapshot, shards: &[Snapshot], options: &VerifyOptions) -> VerificationReport {
    if shards.is_empty() {
        return VerificationReport::failed(FailReason::NoShards, 0);
    }

    if global.iter().all(|(_, t)| tensor::is_all_zero(t)) {
        return VerificationReport::failed(FailReason::ZeroWeights, shards.len());
    }

    let mut discrepancies = Vec::new();
    let mut checked_params = 0;

    for (name, global_tensor) in global.iter().take(options.sample_limit) {
        let present: Vec<&Tensor> = shards.iter().filter_map(|s| s.get(name)).collect();
        if present.is_empty() {
            continue;
        }

        checked_params += 1;
        let diff = match expected_average(&present, global_tensor.shape()) {
            Some(expected) => {
                tensor::max_abs_diff(global_tensor, &expected).unwrap_or(f64::INFINITY)
            }
            None => f64::INFINITY,
        };

        // NaN never compares below the tolerance
        if !(diff <= options.tolerance) {
            discrepancies.push(Discrepancy {
                name: name.to_string(),
                max_abs_diff: diff,
            });
        }
    }

    let verdict = if !discrepancies.is_empty() {
        Verdict::Failed(FailReason::Discrepancies)
    } else if checked_params == 0 {
        Verdict::Inconclusive
    } else {
        Verdict::Passed
    };

    VerificationReport {
        verdict,
        discrepancies,
        shards_used: shards.len(),
        checked_params,
        skipped: Vec::new(),
    }
}

/// The element-wise mean of `tensors`, or `None` if any of them isn't shaped `shape`.
fn expected_average(tensors: &[&Tensor], shape: &[usize]) -> Option<Tensor> {
    let mut sum = ArrayD::<f64>::zeros(IxDyn(shape));
    for t in tensors {
        if t.shape() != shape {
            return None;
        }
        sum.zip_mut_with(*t, |acc, &v| *acc += f64::from(v));
    }

    let n = tensors.len() as f64;
    Some(sum.mapv(|v| (v / n) as f32))
}

/// Loads the snapshots from disk and verifies them.
///
/// Shards that fail to load are skipped with a warning and listed in the report.
///
/// # Errors
/// If the global snapshot can't be loaded.
pub fn verify_paths<P: AsRef<Path>>(
    global: &Path,
    shards: &[P],
    options: &VerifyOptions,
) -> comms::Result<(Snapshot, Vec<Snapshot>, VerificationReport)> {
    let global = snapshot::load(global)?;

    let mut loaded = Vec::with_capacity(shards.len());
    let mut skipped = Vec::new();
    for path in shards {
        let path = path.as_ref();
        match snapshot::load(path) {
            Ok(snapshot) => loaded.push(snapshot),
            Err(e) => {
                warn!("skipping shard {}: {e}", path.display());
                skipped.push(path.to_path_buf());
            }
        }
    }

    let mut report = verify(&global, &loaded, options);
    report.skipped = skipped;
    Ok((global, loaded, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, &[usize], f32)]) -> Snapshot {
        Snapshot::from_entries(
            entries
                .iter()
                .map(|&(name, shape, v)| (name, ArrayD::from_elem(IxDyn(shape), v))),
        )
        .unwrap()
    }

    fn shards() -> Vec<Snapshot> {
        [1.0, 2.0, 6.0]
            .map(|v| snapshot(&[("w", &[2, 3], v), ("b", &[3], -v)]))
            .into()
    }

    #[test]
    fn exact_average_passes() {
        let global = snapshot(&[("w", &[2, 3], 3.0), ("b", &[3], -3.0)]);
        let report = verify(&global, &shards(), &VerifyOptions::default());

        assert_eq!(report.verdict, Verdict::Passed);
        assert!(report.passed());
        assert_eq!(report.checked_params, 2);
        assert_eq!(report.shards_used, 3);
        assert!(report.discrepancies.is_empty());
    }

    #[test]
    fn perturbed_parameter_is_reported() {
        let global = snapshot(&[("w", &[2, 3], 3.0), ("b", &[3], -2.9)]);
        let report = verify(&global, &shards(), &VerifyOptions::default());

        assert_eq!(report.verdict, Verdict::Failed(FailReason::Discrepancies));
        assert!(!report.passed());
        assert_eq!(report.discrepancies.len(), 1);
        assert_eq!(report.discrepancies[0].name, "b");
        assert!((report.discrepancies[0].max_abs_diff - 0.1).abs() < 1e-5);
    }

    #[test]
    fn zero_weights_fail_before_averaging() {
        let zero = [snapshot(&[("w", &[2], 0.0)])];
        let report = verify(&zero[0], &zero, &VerifyOptions::default());

        assert_eq!(report.verdict, Verdict::Failed(FailReason::ZeroWeights));
        assert_eq!(report.checked_params, 0);
    }

    #[test]
    fn no_shards_fail() {
        let global = snapshot(&[("w", &[2], 1.0)]);
        let report = verify(&global, &[], &VerifyOptions::default());
        assert_eq!(report.verdict, Verdict::Failed(FailReason::NoShards));
    }

    #[test]
    fn unmatched_names_are_inconclusive() {
        let global = snapshot(&[("other", &[2], 1.0)]);
        let report = verify(&global, &shards(), &VerifyOptions::default());

        assert_eq!(report.verdict, Verdict::Inconclusive);
        assert!(report.passed());
    }

    #[test]
    fn only_the_sampled_prefix_is_checked() {
        let global = snapshot(&[("w", &[2, 3], 3.0), ("b", &[3], 100.0)]);
        let options = VerifyOptions {
            sample_limit: 1,
            ..Default::default()
        };

        let report = verify(&global, &shards(), &options);
        assert_eq!(report.verdict, Verdict::Passed);
        assert_eq!(report.checked_params, 1);
    }

    #[test]
    fn shape_mismatch_and_nan_are_discrepancies() {
        let global = snapshot(&[("w", &[6], 3.0), ("b", &[3], f32::NAN)]);
        let report = verify(&global, &shards(), &VerifyOptions::default());

        let names: Vec<_> = report.discrepancies.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["w", "b"]);
        assert_eq!(report.discrepancies[0].max_abs_diff, f64::INFINITY);
        assert!(report.discrepancies[1].max_abs_diff.is_nan());
    }

    #[test]
    fn names_missing_from_some_shards_average_the_rest() {
        let shards = [
            snapshot(&[("w", &[1], 2.0), ("extra", &[1], 10.0)]),
            snapshot(&[("w", &[1], 4.0)]),
        ];
        let global = snapshot(&[("w", &[1], 3.0), ("extra", &[1], 10.0)]);

        let report = verify(&global, &shards, &VerifyOptions::default());
        assert_eq!(report.verdict, Verdict::Passed);
        assert_eq!(report.checked_params, 2);
    }
}
