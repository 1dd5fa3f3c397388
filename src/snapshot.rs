//! Snapshot
//!
//! Immutable point-in-time materialization of the full dataset.
//!
//! A loader builds a `Snapshot` in one go; after that it is never mutated.
//! The data node hands out `Arc<Snapshot>` to readers, so a superseded
//! snapshot is freed only once the last in-flight lookup drops its handle.

use std::collections::HashMap;

use bytes::Bytes;

/// Immutable key → value mapping
#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    entries: HashMap<Bytes, Bytes>,
}

impl Snapshot {
    /// Create an empty snapshot (used by the `AllowEmpty` boot policy)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Exact-match, case-sensitive lookup.
    ///
    /// The returned `Bytes` shares the snapshot's buffer; no copy is made.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.entries.get(key).cloned()
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries (unordered)
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Bytes)> {
        self.entries.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Snapshot
where
    K: Into<Bytes>,
    V: Into<Bytes>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
