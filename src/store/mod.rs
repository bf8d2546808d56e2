//! Key-Value Store
//!
//! The provider keeps all of its state in a single ordered byte-keyed store.
//! Iteration is always in ascending key order, which the pending-proposal and
//! unbonding-index walks rely on.

use std::collections::BTreeMap;

pub mod keys;

/// Ordered byte-keyed store backing the provider keeper.
pub trait KvStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Removes `key`. Deleting an absent key is a no-op.
    fn delete(&mut self, key: &[u8]);

    /// Iterates all entries whose key starts with `prefix`, in ascending key order.
    ///
    /// The iterator is lazy so callers can stop at the first entry they do not need.
    fn prefix_iter<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }
}

/// In-memory store used by the node and by tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    fn prefix_iter<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        let prefix = prefix.to_vec();
        Box::new(
            self.entries
                .range(prefix.clone()..)
                .take_while(move |(k, _)| k.starts_with(&prefix))
                .map(|(k, v)| (k.clone(), v.clone())),
        )
    }
}
