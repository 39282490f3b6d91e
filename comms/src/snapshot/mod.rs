mod codec;

use std::collections::{BTreeSet, HashMap};

pub use codec::{PARAM_ORDER_KEY, load, read_tensors, save};

use crate::{Result, SnapshotErr, Tensor};

/// An ordered mapping from parameter name to tensor.
///
/// The insertion order is the snapshot's key order: merging iterates it and the
/// verifier samples a prefix of it, so it is preserved through `save` and `load`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    entries: Vec<(String, Tensor)>,
    index: HashMap<String, usize>,
}

impl Snapshot {
    /// Creates an empty `Snapshot`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from `(name, tensor)` pairs, keeping their order.
    ///
    /// # Errors
    /// `SnapshotErr::DuplicateName` if a name is repeated.
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Tensor)>,
        S: Into<String>,
    {
        let mut snapshot = Self::new();
        for (name, tensor) in entries {
            snapshot.insert(name, tensor)?;
        }

        Ok(snapshot)
    }

    /// Appends a parameter at the end of the key order.
    ///
    /// # Errors
    /// `SnapshotErr::DuplicateName` if `name` is already present.
    pub fn insert<S: Into<String>>(&mut self, name: S, tensor: Tensor) -> Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(SnapshotErr::DuplicateName(name));
        }

        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, tensor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates the parameter names in key order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Iterates `(name, tensor)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(name, t)| (name.as_str(), t))
    }

    /// Returns the set of parameter names, ignoring order.
    pub fn name_set(&self) -> BTreeSet<&str> {
        self.names().collect()
    }

    /// Total amount of scalar parameters across every tensor.
    pub fn num_params(&self) -> usize {
        self.entries.iter().map(|(_, t)| t.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;

    fn filled(shape: &[usize], value: f32) -> Tensor {
        ArrayD::from_elem(IxDyn(shape), value)
    }

    #[test]
    fn keeps_insertion_order() {
        let snapshot = Snapshot::from_entries([
            ("fc2.weight", filled(&[2, 2], 1.0)),
            ("fc1.weight", filled(&[2], 2.0)),
            ("fc1.bias", filled(&[], 3.0)),
        ])
        .unwrap();

        let names: Vec<_> = snapshot.names().collect();
        assert_eq!(names, ["fc2.weight", "fc1.weight", "fc1.bias"]);
        assert_eq!(snapshot.get("fc1.weight"), Some(&filled(&[2], 2.0)));
        assert_eq!(snapshot.num_params(), 7);
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("w", filled(&[1], 0.0)).unwrap();

        let err = snapshot.insert("w", filled(&[1], 1.0)).unwrap_err();
        assert!(matches!(err, SnapshotErr::DuplicateName(name) if name == "w"));
        assert_eq!(snapshot.len(), 1);
    }
}
