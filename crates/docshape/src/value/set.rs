//! Hash-keyed value sets.

use std::collections::BTreeMap;

use super::{Value, hash_value};

/// A set of values keyed by their structural hash.
///
/// Each element is stored under [`hash_value`] of itself. There is no
/// chaining: a second element with the same digest is treated as already
/// present. Equality compares digests only.
#[derive(Debug, Clone, Default)]
pub struct ValueSet {
    entries: BTreeMap<u64, Value>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds `value`. Returns false if an element with the same digest exists.
    pub fn insert(&mut self, value: Value) -> bool {
        let key = hash_value(&value);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, value);
        true
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.entries.contains_key(&hash_value(value))
    }

    pub fn remove(&mut self, value: &Value) -> Option<Value> {
        self.entries.remove(&hash_value(value))
    }

    /// Returns the element stored under `key`.
    pub fn get_by_hash(&self, key: u64) -> Option<&Value> {
        self.entries.get(&key)
    }

    /// Element digests in ascending order.
    pub fn keys(&self) -> impl ExactSizeIterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }

    /// Elements in ascending digest order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Value> {
        self.entries.values()
    }
}

impl PartialEq for ValueSet {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.keys().eq(other.entries.keys())
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = ValueSet::new();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

impl IntoIterator for ValueSet {
    type Item = Value;
    type IntoIter = std::collections::btree_map::IntoValues<u64, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

impl<'a> IntoIterator for &'a ValueSet {
    type Item = &'a Value;
    type IntoIter = std::collections::btree_map::Values<'a, u64, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}
