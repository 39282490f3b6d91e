use std::{num::NonZeroUsize, ops::Range};

use machine_learning::dataset::Dataset;

use crate::error::PartitionErr;

type Result<T> = std::result::Result<T, PartitionErr>;

/// Label prefix the orchestrator gives its nodes, `node-1` being the first shard.
pub const NODE_LABEL_PREFIX: &str = "node-";

/// Splits `total` samples among `shards` and returns the range owned by `index`.
///
/// Properties:
/// - Ranges are contiguous, disjoint and cover `[0..total)`.
/// - Every shard gets `total / shards` samples, the last one also takes the remainder.
///
/// # Errors
/// `PartitionErr::InvalidPartition` if `shards` is zero or `index` is not below it.
pub fn partition(total: usize, shards: usize, index: usize) -> Result<Range<usize>> {
    if shards == 0 || index >= shards {
        return Err(PartitionErr::InvalidPartition { index, shards });
    }

    Ok(bounds(total, shards, index))
}

fn bounds(total: usize, shards: usize, index: usize) -> Range<usize> {
    let chunk = total / shards;
    let start = index * chunk;
    let end = if index == shards - 1 {
        total
    } else {
        start + chunk
    };

    start..end
}

/// Shard specification for a training job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
    shard_index: usize,
    total_shards: NonZeroUsize,
}

impl ShardSpec {
    /// Creates a new `ShardSpec`.
    ///
    /// # Errors
    /// `PartitionErr::InvalidPartition` if `shard_index` is out of range.
    pub fn new(shard_index: usize, total_shards: NonZeroUsize) -> Result<Self> {
        if shard_index >= total_shards.get() {
            return Err(PartitionErr::InvalidPartition {
                index: shard_index,
                shards: total_shards.get(),
            });
        }

        Ok(Self {
            shard_index,
            total_shards,
        })
    }

    /// Parses a command line shard label.
    ///
    /// `node-k` is 1-based and maps to index `k - 1`, a bare integer is taken as
    /// the 0-based index itself.
    ///
    /// # Errors
    /// `PartitionErr::InvalidShardLabel` if the label is neither form, and
    /// `PartitionErr::InvalidPartition` if the index is out of range.
    pub fn from_label(label: &str, total_shards: NonZeroUsize) -> Result<Self> {
        let invalid = || PartitionErr::InvalidShardLabel(label.to_string());

        let shard_index = match label.strip_prefix(NODE_LABEL_PREFIX) {
            Some(k) => k
                .parse::<usize>()
                .ok()
                .and_then(|k| k.checked_sub(1))
                .ok_or_else(invalid)?,
            None => label.parse().map_err(|_| invalid())?,
        };

        Self::new(shard_index, total_shards)
    }

    pub fn shard_index(&self) -> usize {
        self.shard_index
    }

    pub fn total_shards(&self) -> usize {
        self.total_shards.get()
    }

    #[inline]
    pub fn range(self, total: usize) -> Range<usize> {
        bounds(total, self.total_shards(), self.shard_index)
    }
}

/// Selecting the rows a shard owns out of a full dataset.
pub trait Shard {
    fn shard(&self, spec: ShardSpec) -> machine_learning::Result<Dataset>;
}

impl Shard for Dataset {
    fn shard(&self, spec: ShardSpec) -> machine_learning::Result<Dataset> {
        self.subset(spec.range(self.len()))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use proptest::prelude::*;

    use super::*;

    fn shards(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn remainder_goes_to_the_last_shard() {
        // total 10, shards 3 => sizes 3,3,4
        assert_eq!(partition(10, 3, 0).unwrap(), 0..3);
        assert_eq!(partition(10, 3, 1).unwrap(), 3..6);
        assert_eq!(partition(10, 3, 2).unwrap(), 6..10);
    }

    #[test]
    fn single_shard_owns_everything() {
        assert_eq!(partition(60000, 1, 0).unwrap(), 0..60000);
        assert_eq!(partition(0, 1, 0).unwrap(), 0..0);
    }

    #[test]
    fn more_shards_than_samples() {
        assert_eq!(partition(2, 3, 0).unwrap(), 0..0);
        assert_eq!(partition(2, 3, 1).unwrap(), 0..0);
        assert_eq!(partition(2, 3, 2).unwrap(), 0..2);
    }

    #[test]
    fn invalid_partitions_are_rejected() {
        assert!(matches!(
            partition(10, 0, 0),
            Err(PartitionErr::InvalidPartition { index: 0, shards: 0 })
        ));
        assert!(matches!(
            partition(10, 3, 3),
            Err(PartitionErr::InvalidPartition { index: 3, shards: 3 })
        ));
        assert!(ShardSpec::new(3, shards(3)).is_err());
    }

    #[test]
    fn labels_parse_as_nodes_or_indices() {
        let spec = ShardSpec::from_label("node-2", shards(3)).unwrap();
        assert_eq!(spec.shard_index(), 1);

        let spec = ShardSpec::from_label("2", shards(3)).unwrap();
        assert_eq!(spec.shard_index(), 2);

        for label in ["node-0", "node-", "worker-1", "-1", ""] {
            assert!(
                matches!(
                    ShardSpec::from_label(label, shards(3)),
                    Err(PartitionErr::InvalidShardLabel(_))
                ),
                "{label}"
            );
        }

        assert!(matches!(
            ShardSpec::from_label("node-4", shards(3)),
            Err(PartitionErr::InvalidPartition { index: 3, .. })
        ));
    }

    #[test]
    fn dataset_shard_takes_the_owned_rows() {
        let x = Array2::from_shape_fn((7, 1), |(r, _)| r as f32);
        let dataset = Dataset::new(x.clone(), x).unwrap();

        let shard = dataset.shard(ShardSpec::new(1, shards(2)).unwrap()).unwrap();
        assert_eq!(shard.len(), 4);
        assert_eq!(shard.x()[[0, 0]], 3.0);
    }

    proptest! {
        #[test]
        fn ranges_cover_the_dataset_without_overlap(total in 0usize..10_000, n in 1usize..64) {
            let mut next = 0;
            for index in 0..n {
                let range = partition(total, n, index).unwrap();
                prop_assert_eq!(range.start, next);
                prop_assert!(range.start <= range.end);
                next = range.end;
            }
            prop_assert_eq!(next, total);
        }

        #[test]
        fn last_shard_absorbs_the_remainder(total in 0usize..10_000, n in 1usize..64) {
            let chunk = total / n;
            for index in 0..n - 1 {
                prop_assert_eq!(partition(total, n, index).unwrap().len(), chunk);
            }
            prop_assert_eq!(partition(total, n, n - 1).unwrap().len(), chunk + total % n);
        }

        #[test]
        fn spec_range_matches_partition(total in 0usize..10_000, n in 1usize..64, index in 0usize..64) {
            prop_assume!(index < n);
            let spec = ShardSpec::new(index, shards(n)).unwrap();
            prop_assert_eq!(spec.range(total), partition(total, n, index).unwrap());
        }
    }
}
