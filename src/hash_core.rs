//! Hash-based storage core shared by sets and maps.
//!
//! Layout: a `HashTable` index over a `SlotMap` slot arena. Vacant slots and
//! the table's deleted control bytes are the tombstones; enumeration walks
//! occupied slots only, so tombstones are never counted. Each slot stores its
//! precomputed `u64` hash and indexing always uses the stored hash: `K: Hash`
//! is never invoked after insertion, so growth and rehashing never call back
//! into user code.
//!
//! The `version` stamp bumps exactly when logical contents or capacity
//! change. Inserting an already-present key is a no-op and version-neutral.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;

#[derive(Clone, Debug)]
struct Slot<K, V> {
    key: K,
    value: V,
    hash: u64,
}

/// Iterator over occupied slots, in slot order.
pub(crate) struct Entries<'a, K, V> {
    it: slotmap::basic::Iter<'a, DefaultKey, Slot<K, V>>,
}

impl<'a, K, V> Iterator for Entries<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, s)| (&s.key, &s.value))
    }
}

#[derive(Clone)]
pub(crate) struct HashCore<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Slot<K, V>>,
    version: u64,
}

impl<K, V, S> HashCore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub(crate) fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: SlotMap::with_key(),
            version: 0,
        }
    }

    pub(crate) fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::with_capacity(capacity),
            slots: SlotMap::with_capacity_and_key(capacity),
            version: 0,
        }
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    /// Slots usable before the next growth, counting tombstoned ones.
    pub(crate) fn capacity(&self) -> usize {
        self.index.capacity().min(self.slots.capacity())
    }

    pub(crate) fn find<Q>(&self, q: &Q) -> Option<DefaultKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|s| s.key.borrow() == q)
                    .unwrap_or(false)
            })
            .copied()
    }

    pub(crate) fn contains<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    pub(crate) fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let k = self.find(q)?;
        self.slots.get(k).map(|s| &s.value)
    }

    pub(crate) fn get_entry<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let k = self.find(q)?;
        self.slots.get(k).map(|s| (&s.key, &s.value))
    }

    /// Insert `key -> value`; returns false (and changes nothing, including
    /// the version) when the key is already present.
    pub(crate) fn insert(&mut self, key: K, value: V) -> bool {
        let hash = self.make_hash(&key);
        match self.index.entry(
            hash,
            |&k| self.slots.get(k).map(|s| s.key == key).unwrap_or(false),
            |&k| self.slots.get(k).map(|s| s.hash).unwrap_or(0),
        ) {
            hashbrown::hash_table::Entry::Occupied(_) => false,
            hashbrown::hash_table::Entry::Vacant(v) => {
                let k = self.slots.insert(Slot { key, value, hash });
                let _ = v.insert(k);
                self.version += 1;
                true
            }
        }
    }

    /// Swap the value of an existing key; `None` when the key is absent.
    pub(crate) fn replace<Q>(&mut self, q: &Q, value: V) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let k = self.find(q)?;
        let slot = self.slots.get_mut(k)?;
        let old = core::mem::replace(&mut slot.value, value);
        self.version += 1;
        Some(old)
    }

    // Remove a slot and unlink it from the index without touching the
    // version; callers decide how one logical operation stamps.
    fn unlink(&mut self, k: DefaultKey) -> Option<(K, V)> {
        let slot = self.slots.remove(k)?;
        match self.index.find_entry(slot.hash, |&kk| kk == k) {
            Ok(occupied) => {
                occupied.remove();
            }
            Err(_) => debug_assert!(false, "occupied slot missing from index"),
        }
        Some((slot.key, slot.value))
    }

    pub(crate) fn remove<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let k = self.find(q)?;
        let entry = self.unlink(k);
        if entry.is_some() {
            self.version += 1;
        }
        entry
    }

    /// Remove by slot key; used by cursors for the sanctioned in-iteration
    /// removal. Stale keys (already-removed slots) resolve to `None`.
    pub(crate) fn remove_slot(&mut self, k: DefaultKey) -> Option<(K, V)> {
        let entry = self.unlink(k);
        if entry.is_some() {
            self.version += 1;
        }
        entry
    }

    pub(crate) fn slot(&self, k: DefaultKey) -> Option<(&K, &V)> {
        self.slots.get(k).map(|s| (&s.key, &s.value))
    }

    /// Slot keys in enumeration order, snapshotted for cursor traversal.
    pub(crate) fn slot_keys(&self) -> Vec<DefaultKey> {
        self.slots.keys().collect()
    }

    pub(crate) fn entries(&self) -> Entries<'_, K, V> {
        Entries {
            it: self.slots.iter(),
        }
    }

    /// Keep entries satisfying `keep`; returns how many were dropped.
    pub(crate) fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let doomed: Vec<DefaultKey> = self
            .slots
            .iter()
            .filter(|(_, s)| !keep(&s.key, &s.value))
            .map(|(k, _)| k)
            .collect();
        for &k in &doomed {
            let _ = self.unlink(k);
        }
        if !doomed.is_empty() {
            self.version += 1;
        }
        doomed.len()
    }

    pub(crate) fn clear(&mut self) {
        if !self.slots.is_empty() {
            self.slots.clear();
            self.index.clear();
            self.version += 1;
        }
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        let index_cap = self.index.capacity();
        let slots_cap = self.slots.capacity();
        self.index
            .reserve(additional, |&k| {
                self.slots.get(k).map(|s| s.hash).unwrap_or(0)
            });
        self.slots.reserve(additional);
        if self.index.capacity() != index_cap || self.slots.capacity() != slots_cap {
            self.version += 1;
        }
    }
}
