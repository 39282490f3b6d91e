//! Parameter-wise averaging of shard snapshots into a global snapshot.

use std::path::Path;

use comms::{Snapshot, snapshot};
use log::{debug, info};

use crate::error::{MergeErr, Result};

/// Averages `snapshots` element-wise into a new global snapshot.
///
/// Every snapshot must have the same parameter names and per-name shapes as the
/// first one. The output keeps the first snapshot's key order. Sums are accumulated
/// in `f64` and stored back as `f32`.
///
/// # Errors
/// `MergeErr::EmptyMergeSet` if `snapshots` is empty, `MergeErr::SchemaMismatch` or
/// `MergeErr::ShapeMismatch` if any snapshot disagrees with the first.
pub fn merge(snapshots: &[Snapshot]) -> Result<Snapshot> {
    let (first, rest) = snapshots.split_first().ok_or(MergeErr::EmptyMergeSet)?;

    for (i, snapshot) in rest.iter().enumerate() {
        check_schema(first, snapshot, i + 1)?;
    }

    let n = snapshots.len() as f64;
    let mut merged = Snapshot::new();

    for (name, tensor) in first.iter() {
        let mut sum = tensor.mapv(f64::from);

        for (i, snapshot) in rest.iter().enumerate() {
            let index = i + 1;
            let other = snapshot
                .get(name)
                .ok_or_else(|| MergeErr::SchemaMismatch {
                    index,
                    missing: vec![name.to_string()],
                    extra: Vec::new(),
                })?;

            if other.shape() != tensor.shape() {
                return Err(MergeErr::ShapeMismatch {
                    name: name.to_string(),
                    index,
                    expected: tensor.shape().to_vec(),
                    got: other.shape().to_vec(),
                });
            }

            sum.zip_mut_with(other, |acc, &v| *acc += f64::from(v));
        }

        merged.insert(name, sum.mapv(|v| (v / n) as f32))?;
    }

    debug!(params = merged.num_params(), models = snapshots.len(); "snapshots averaged");
    Ok(merged)
}

fn check_schema(first: &Snapshot, other: &Snapshot, index: usize) -> Result<()> {
    let expected = first.name_set();
    let got = other.name_set();

    if expected == got {
        return Ok(());
    }

    let missing = expected.difference(&got).map(|s| s.to_string()).collect();
    let extra = got.difference(&expected).map(|s| s.to_string()).collect();
    Err(MergeErr::SchemaMismatch {
        index,
        missing,
        extra,
    })
}

/// Loads every snapshot in `paths` and merges them.
///
/// # Errors
/// Any snapshot failing to load aborts the merge, as well as every error of `merge`.
pub fn merge_files<P: AsRef<Path>>(paths: &[P]) -> Result<Snapshot> {
    let snapshots = paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            info!("loading {}", path.display());
            snapshot::load(path)
        })
        .collect::<comms::Result<Vec<_>>>()?;

    merge(&snapshots)
}

/// Merges the snapshots in `paths` and persists the result to `out`.
///
/// Nothing is written unless the merge succeeds.
///
/// # Returns
/// The merged snapshot.
pub fn merge_to<P: AsRef<Path>>(paths: &[P], out: &Path) -> Result<Snapshot> {
    let merged = merge_files(paths)?;
    snapshot::save(&merged, out)?;
    info!(models = paths.len(); "global model saved to {}", out.display());
    Ok(merged)
}
