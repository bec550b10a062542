//! Insertion-ordered string-keyed container with lookup by key and by position.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// A map that remembers insertion order.
///
/// Entries live in a vector (position → entry) with a hash index on the side
/// (key → position), so both lookups are O(1). Keys can never be replaced or
/// removed; values may be modified in place through [`OrderedMap::get_mut`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` under `key` at the next position.
    ///
    /// # Errors
    ///
    /// `InvalidKey` for an empty or purely numeric key, `DuplicateKey` if the
    /// key is already present. The container is untouched on error.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Result<()> {
        let key = key.into();
        if !is_valid_key(&key) {
            return Err(Error::InvalidKey(key));
        }
        if self.index.contains_key(&key) {
            return Err(Error::DuplicateKey(key));
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        Ok(())
    }

    /// # Errors
    ///
    /// `NotFound` if `key` was never inserted.
    pub fn get(&self, key: &str) -> Result<&V> {
        self.index
            .get(key)
            .map(|&pos| &self.entries[pos].1)
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    /// # Errors
    ///
    /// `NotFound` if `key` was never inserted.
    pub fn get_mut(&mut self, key: &str) -> Result<&mut V> {
        match self.index.get(key) {
            Some(&pos) => Ok(&mut self.entries[pos].1),
            None => Err(Error::NotFound(key.to_string())),
        }
    }

    /// # Errors
    ///
    /// `IndexOutOfRange` if `position >= len()`.
    pub fn get_at(&self, position: usize) -> Result<&V> {
        self.entries
            .get(position)
            .map(|(_, v)| v)
            .ok_or(Error::IndexOutOfRange {
                index: position,
                len: self.entries.len(),
            })
    }

    /// Resolve a user-supplied selector: an exact key first, then a decimal
    /// position.
    ///
    /// # Errors
    ///
    /// `NotFound` when the selector is neither a key nor a number,
    /// `IndexOutOfRange` when it is a number past the end.
    pub fn lookup(&self, selector: &str) -> Result<&V> {
        if let Ok(v) = self.get(selector) {
            return Ok(v);
        }
        match selector.parse::<usize>() {
            Ok(position) => self.get_at(position),
            Err(_) => Err(Error::NotFound(selector.to_string())),
        }
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// Numeric keys would shadow positional selectors in `lookup`.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.bytes().all(|b| b.is_ascii_digit())
}
