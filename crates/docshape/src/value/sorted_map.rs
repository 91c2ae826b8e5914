//! Key-sorted associative container backing `Struct` and `Map`.
//!
//! Entries live in a flat `Vec` ordered by key. Lookups are binary searches,
//! inserts and removals shift the tail. Small records stay cache-local and
//! iteration order is deterministic, which structural hashing relies on.

use std::ops::ControlFlow;

/// An ordered map from string keys to `V`, sorted ascending by key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortedMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for SortedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> SortedMap<V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty map with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &str) -> Result<usize, usize> {
        self.entries.binary_search_by(|(k, _)| k.as_str().cmp(key))
    }

    /// Looks up `key` in O(log n).
    pub fn get(&self, key: &str) -> Option<&V> {
        self.position(key).ok().map(|i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        match self.position(key) {
            Ok(i) => Some(&mut self.entries[i].1),
            Err(_) => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_ok()
    }

    /// Inserts or replaces the value at `key`, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.position(&key) {
            Ok(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            Err(i) => {
                self.entries.insert(i, (key, value));
                None
            }
        }
    }

    /// Removes `key`, returning its value if it was present.
    pub fn unset(&mut self, key: &str) -> Option<V> {
        match self.position(key) {
            Ok(i) => Some(self.entries.remove(i).1),
            Err(_) => None,
        }
    }

    /// Visits entries in ascending key order until `f` breaks.
    ///
    /// Returns `true` if every entry was visited.
    pub fn for_each<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&str, &V) -> ControlFlow<()>,
    {
        for (k, v) in &self.entries {
            if f(k, v).is_break() {
                return false;
            }
        }
        true
    }

    /// Iterates entries in ascending key order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &V)> + DoubleEndedIterator {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates values in key order, mutably.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    /// Returns a fresh, sorted copy of the keys.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Returns a fresh copy of the values, in key order.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Returns true if both maps hold exactly the same keys.
    pub fn same_keys<W>(&self, other: &SortedMap<W>) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|((a, _), (b, _))| a == b)
    }

    /// Applies `f` to every value, keeping keys and order.
    pub fn map_values<W, F>(self, mut f: F) -> SortedMap<W>
    where
        F: FnMut(V) -> W,
    {
        SortedMap {
            entries: self.entries.into_iter().map(|(k, v)| (k, f(v))).collect(),
        }
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for SortedMap<V> {
    /// Later duplicates replace earlier ones.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut entries: Vec<(String, V)> = iter.into_iter().map(|(k, v)| (k.into(), v)).collect();
        // Stable sort keeps insertion order among equal keys; keep the last one.
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let mut deduped: Vec<(String, V)> = Vec::with_capacity(entries.len());
        for (k, v) in entries {
            match deduped.last_mut() {
                Some(last) if last.0 == k => last.1 = v,
                _ => deduped.push((k, v)),
            }
        }
        Self { entries: deduped }
    }
}

impl<V> IntoIterator for SortedMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, V> IntoIterator for &'a SortedMap<V> {
    type Item = (&'a str, &'a V);
    type IntoIter = std::iter::Map<std::slice::Iter<'a, (String, V)>, fn(&'a (String, V)) -> (&'a str, &'a V)>;

    fn into_iter(self) -> Self::IntoIter {
        fn split<V>((k, v): &(String, V)) -> (&str, &V) {
            (k.as_str(), v)
        }
        self.entries
            .iter()
            .map(split as fn(&'a (String, V)) -> (&'a str, &'a V))
    }
}
