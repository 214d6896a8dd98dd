//! Insertion-ordered keyed container used for every in-memory cache.
//!
//! [`Dict`] behaves like a map whose iteration order is the order keys were first
//! inserted. Overwriting an existing key keeps its position; deleting a key shifts
//! later entries down. On top of the map primitives it offers the bulk queries and
//! set algebra the resource caches need: [`Dict::join`] to fold pages together,
//! [`Dict::difference`] to spot entries that disappeared, and
//! [`Dict::find`]/[`Dict::filter`]/[`Dict::part`] for lookups without hand-written loops.
//!
//! # Capacity limit
//!
//! [`Dict::set_limit`] is a one-shot configuration, not a throttle: it can be called
//! exactly once per container, and afterwards any insertion of a new key beyond the
//! limit fails with [`Capacity::Exceeded`]. Containers derived from another one
//! (`clone`, `filter`, `join`, ...) start without a limit.
//!
//! # Example
//!
//! ```
//! use pterodactyl_client_sdk::dict::Dict;
//!
//! # fn main() -> pterodactyl_client_sdk::Result<()> {
//! let mut servers = Dict::new();
//! servers.set("a1b2", "lobby")?;
//! servers.set("c3d4", "survival")?;
//!
//! assert_eq!(servers.first(), Some(&"lobby"));
//! assert_eq!(servers.find(|name, _| name.starts_with('s')), Some(&"survival"));
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::hash::Hash;

use indexmap::IndexMap;
use indexmap::map::{IntoIter, Iter, Keys, Values};
use rand::seq::IteratorRandom as _;

use crate::Result;
use crate::error::Capacity;

/// Insertion-ordered map with set-theoretic and aggregate helpers.
pub struct Dict<K, V> {
    entries: IndexMap<K, V>,
    limit: Option<usize>,
}

impl<K, V> Dict<K, V> {
    /// Creates an empty container without a limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            limit: None,
        }
    }

    /// The configured capacity limit, if any.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Configures the capacity limit. Only the first call succeeds.
    pub fn set_limit(&mut self, limit: usize) -> Result<()> {
        if let Some(current) = self.limit {
            return Err(Capacity::LimitAlreadySet { limit: current }.into());
        }

        self.limit = Some(limit);
        Ok(())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        self.entries.iter()
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        self.entries.keys()
    }

    pub fn values(&self) -> Values<'_, K, V> {
        self.entries.values()
    }

    /// Removes every entry. The limit is left untouched.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns `true` as soon as one entry passes `predicate`.
    pub fn some<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&V, &K) -> bool,
    {
        self.entries.iter().any(|(k, v)| predicate(v, k))
    }

    /// Returns `false` as soon as one entry fails `predicate`.
    pub fn every<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&V, &K) -> bool,
    {
        self.entries.iter().all(|(k, v)| predicate(v, k))
    }

    /// The first value in iteration order.
    #[must_use]
    pub fn first(&self) -> Option<&V> {
        self.entries.first().map(|(_, v)| v)
    }

    /// Up to `amount` values from the front, in iteration order.
    #[must_use]
    pub fn first_n(&self, amount: usize) -> Vec<&V> {
        self.entries.values().take(amount).collect()
    }

    /// The last value in iteration order.
    #[must_use]
    pub fn last(&self) -> Option<&V> {
        self.entries.last().map(|(_, v)| v)
    }

    /// Up to `amount` values from the back, still in iteration order.
    #[must_use]
    pub fn last_n(&self, amount: usize) -> Vec<&V> {
        let skip = self.entries.len().saturating_sub(amount);
        self.entries.values().skip(skip).collect()
    }

    /// A uniformly chosen value.
    #[must_use]
    pub fn random(&self) -> Option<&V> {
        self.entries.values().choose(&mut rand::rng())
    }

    /// Up to `amount` distinct values chosen at random.
    #[must_use]
    pub fn random_n(&self, amount: usize) -> Vec<&V> {
        self.entries
            .values()
            .choose_multiple(&mut rand::rng(), amount)
    }

    /// Transforms every entry, keeping the container's order.
    pub fn map<T, F>(&self, mut f: F) -> Vec<T>
    where
        F: FnMut(&V, &K) -> T,
    {
        self.entries.iter().map(|(k, v)| f(v, k)).collect()
    }

    /// The first value that passes `predicate`.
    pub fn find<F>(&self, mut predicate: F) -> Option<&V>
    where
        F: FnMut(&V, &K) -> bool,
    {
        self.entries
            .iter()
            .find(|(k, v)| predicate(v, k))
            .map(|(_, v)| v)
    }

    /// Deletes every entry that passes `predicate`, returning how many were removed.
    pub fn sweep<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&V, &K) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|k, v| !predicate(v, k));
        before - self.entries.len()
    }

    /// Left fold over the entries in iteration order.
    pub fn reduce<T, F>(&self, seed: T, mut f: F) -> T
    where
        F: FnMut(T, &V, &K) -> T,
    {
        self.entries.iter().fold(seed, |acc, (k, v)| f(acc, v, k))
    }
}

impl<K: Hash + Eq, V> Dict<K, V> {
    /// Inserts or overwrites `key`, returning the previous value.
    ///
    /// Fails with [`Capacity::Exceeded`] when a limit is configured, the container is
    /// full and `key` is new. Overwriting an existing key never fails.
    pub fn set(&mut self, key: K, value: V) -> Result<Option<V>> {
        if let Some(limit) = self.limit
            && self.entries.len() >= limit
            && !self.entries.contains_key(&key)
        {
            return Err(Capacity::Exceeded { limit }.into());
        }

        Ok(self.entries.insert(key, value))
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    #[must_use]
    pub fn has(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes `key`, preserving the order of the remaining entries.
    pub fn delete(&mut self, key: &K) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    /// Removes `key` and hands back its value.
    pub fn take(&mut self, key: &K) -> Option<V> {
        self.entries.shift_remove(key)
    }

    pub fn has_any<'k, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'k K>,
        K: 'k,
    {
        keys.into_iter().any(|k| self.entries.contains_key(k))
    }

    pub fn has_all<'k, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'k K>,
        K: 'k,
    {
        keys.into_iter().all(|k| self.entries.contains_key(k))
    }

    /// Folds `other` into this container in place, respecting the limit.
    ///
    /// Keys from `other` overwrite existing ones; entries are never removed.
    pub fn merge(&mut self, other: Dict<K, V>) -> Result<()> {
        for (key, value) in other {
            self.set(key, value)?;
        }
        Ok(())
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Dict<K, V> {
    /// A new container with the entries that pass `predicate`, in the same order.
    pub fn filter<F>(&self, mut predicate: F) -> Dict<K, V>
    where
        F: FnMut(&V, &K) -> bool,
    {
        self.entries
            .iter()
            .filter(|(k, v)| predicate(v, k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Splits into `(passing, failing)` without touching `self`.
    pub fn part<F>(&self, mut predicate: F) -> (Dict<K, V>, Dict<K, V>)
    where
        F: FnMut(&V, &K) -> bool,
    {
        let mut pass = Dict::new();
        let mut fail = Dict::new();

        for (k, v) in &self.entries {
            let target = if predicate(v, k) { &mut pass } else { &mut fail };
            target.entries.insert(k.clone(), v.clone());
        }

        (pass, fail)
    }

    /// Union of `self` and `others`. On key collisions the later container wins.
    #[must_use]
    pub fn join(&self, others: &[&Dict<K, V>]) -> Dict<K, V> {
        let mut joined = self.clone();
        for other in others {
            for (k, v) in &other.entries {
                joined.entries.insert(k.clone(), v.clone());
            }
        }
        joined
    }

    /// Entries whose key is present in exactly one of the two containers.
    #[must_use]
    pub fn difference(&self, other: &Dict<K, V>) -> Dict<K, V> {
        let mut diff = self.filter(|_, k| !other.has(k));
        for (k, v) in &other.entries {
            if !self.has(k) {
                diff.entries.insert(k.clone(), v.clone());
            }
        }
        diff
    }
}

/// Shallow copy preserving order. The copy does not inherit the limit.
impl<K: Clone, V: Clone> Clone for Dict<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            limit: None,
        }
    }
}

impl<K, V> Default for Dict<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Dict<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K: Hash + Eq, V> FromIterator<(K, V)> for Dict<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            limit: None,
        }
    }
}

impl<K, V> IntoIterator for Dict<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, K, V> IntoIterator for &'a Dict<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
