//! Immutable hash map, its builder, and the map cursor.

use core::borrow::Borrow;
use core::cell::{RefCell, RefMut};
use core::fmt;
use core::hash::{BuildHasher, Hash, Hasher};
use core::ops::Index;
use slotmap::DefaultKey;
use std::collections::hash_map::RandomState;
use std::sync::{Arc, OnceLock};

use crate::error::CollectionError;
use crate::hash_core::{Entries, HashCore};
use crate::iteration::{IterationGuard, IterationTracker};
use crate::structural;

/// An immutable, value-equality hash map.
///
/// Equality is equal key sets with equal values per key; hashing is
/// order-independent. Enumeration order is unspecified but stable for a
/// given snapshot. There is no mutation API: to modify, seed a
/// [`MapBuilder`] via [`to_builder`](FrozenMap::to_builder) and freeze a new
/// snapshot.
pub struct FrozenMap<K, V, S = RandomState> {
    core: Arc<HashCore<K, V, S>>,
    hash_cache: OnceLock<u64>,
}

impl<K, V, S> FrozenMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.is_empty()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.core.get(key)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.core.get_entry(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.core.contains(key)
    }

    /// Restartable iteration over the snapshot, in unspecified order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.core.entries(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    pub(crate) fn core(&self) -> &Arc<HashCore<K, V, S>> {
        &self.core
    }

    pub(crate) fn from_core(core: Arc<HashCore<K, V, S>>) -> Self {
        Self {
            core,
            hash_cache: OnceLock::new(),
        }
    }

    fn aggregate_hash(&self) -> u64
    where
        V: Hash,
    {
        *self.hash_cache.get_or_init(|| {
            structural::unordered_hash(
                self.core.len(),
                self.core
                    .entries()
                    .map(|(k, v)| structural::pair_hash(k, v)),
            )
        })
    }
}

impl<K, V, S> FrozenMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone,
{
    /// Seed a builder from this snapshot. O(1): storage is shared until the
    /// builder's first mutation.
    pub fn to_builder(&self) -> MapBuilder<K, V, S> {
        MapBuilder {
            core: RefCell::new(Arc::clone(&self.core)),
            state: IterationTracker::new(),
        }
    }
}

impl<K, V, S> Clone for FrozenMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            hash_cache: self.hash_cache.clone(),
        }
    }
}

impl<K, V, S> Default for FrozenMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::from_core(Arc::new(HashCore::with_hasher(S::default())))
    }
}

impl<K, V, S> PartialEq for FrozenMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.core, &other.core) {
            return true;
        }
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.core.get(k).map_or(false, |w| v == w))
    }
}

impl<K, V, S> Eq for FrozenMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S> Hash for FrozenMap<K, V, S>
where
    K: Eq + Hash,
    V: Hash,
    S: BuildHasher,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.aggregate_hash());
    }
}

impl<K, V, S> fmt::Debug for FrozenMap<K, V, S>
where
    K: fmt::Debug + Eq + Hash,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Builds from `(key, value)` pairs; on duplicate keys the first occurrence
/// wins, matching the duplicate-insert no-op policy.
impl<K, V, S> FromIterator<(K, V)> for FrozenMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut core = HashCore::with_hasher(S::default());
        for (k, v) in iter {
            core.insert(k, v);
        }
        Self::from_core(Arc::new(core))
    }
}

impl<'a, K, V, S> IntoIterator for &'a FrozenMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, Q, S> Index<&Q> for FrozenMap<K, V, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    S: BuildHasher,
{
    type Output = V;

    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no entry found for key")
    }
}

/// Iterator over a [`FrozenMap`].
pub struct Iter<'a, K, V> {
    inner: Entries<'a, K, V>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Mutable staging structure producing [`FrozenMap`] snapshots.
///
/// Same contract as [`SeqBuilder`](crate::SeqBuilder): single-owner,
/// `!Sync`, dynamic enumeration-safety checks. Inserting a key that is
/// already present is a version-neutral no-op (use
/// [`replace`](MapBuilder::replace) to overwrite) and therefore permitted
/// even while a cursor is active.
pub struct MapBuilder<K, V, S = RandomState> {
    core: RefCell<Arc<HashCore<K, V, S>>>,
    state: IterationTracker,
}

impl<K, V> MapBuilder<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            core: RefCell::new(Arc::new(HashCore::with_capacity_and_hasher(
                capacity,
                RandomState::new(),
            ))),
            state: IterationTracker::new(),
        }
    }
}

impl<K, V, S> MapBuilder<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            core: RefCell::new(Arc::new(HashCore::with_hasher(hasher))),
            state: IterationTracker::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.core.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.core.borrow().capacity()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.core.borrow().contains(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.core.borrow().get(key).cloned()
    }

    /// Freeze the current contents into an immutable snapshot. O(1).
    pub fn freeze(&self) -> FrozenMap<K, V, S> {
        FrozenMap::from_core(Arc::clone(&self.core.borrow()))
    }

    /// Begin an enumeration session over the current contents.
    pub fn cursor(&self) -> MapCursor<'_, K, V, S> {
        let guard = self.state.enter();
        let core = self.core.borrow();
        MapCursor {
            builder: self,
            _guard: guard,
            expected_version: core.version(),
            keys: core.slot_keys(),
            pos: 0,
            current: None,
        }
    }

    fn lock_mut(&self) -> Result<RefMut<'_, Arc<HashCore<K, V, S>>>, CollectionError> {
        self.state.ensure_idle()?;
        self.core
            .try_borrow_mut()
            .map_err(|_| CollectionError::ConcurrentMutation)
    }
}

impl<K, V, S> MapBuilder<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Insert `key -> value`; `Ok(false)` when the key was already present
    /// (the stored value is kept). The no-op path is not a structural
    /// change, so it succeeds even while an enumeration is active.
    pub fn insert(&self, key: K, value: V) -> Result<bool, CollectionError> {
        if self.state.depth() > 0 {
            let core = self
                .core
                .try_borrow()
                .map_err(|_| CollectionError::ConcurrentMutation)?;
            return if core.contains(&key) {
                Ok(false)
            } else {
                Err(CollectionError::ConcurrentMutation)
            };
        }
        let mut core = self
            .core
            .try_borrow_mut()
            .map_err(|_| CollectionError::ConcurrentMutation)?;
        Ok(Arc::make_mut(&mut core).insert(key, value))
    }

    /// Overwrite the value of an existing key, returning the previous one.
    pub fn replace<Q>(&self, key: &Q, value: V) -> Result<V, CollectionError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let mut core = self.lock_mut()?;
        if !core.contains(key) {
            return Err(CollectionError::KeyNotFound);
        }
        Arc::make_mut(&mut core)
            .replace(key, value)
            .ok_or(CollectionError::KeyNotFound)
    }

    /// Remove `key`, returning its value when it was present.
    pub fn remove<Q>(&self, key: &Q) -> Result<Option<V>, CollectionError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let mut core = self.lock_mut()?;
        Ok(Arc::make_mut(&mut core).remove(key).map(|(_, v)| v))
    }

    pub fn clear(&self) -> Result<(), CollectionError> {
        let mut core = self.lock_mut()?;
        Arc::make_mut(&mut core).clear();
        Ok(())
    }

    pub fn reserve(&self, additional: usize) -> Result<(), CollectionError> {
        let mut core = self.lock_mut()?;
        Arc::make_mut(&mut core).reserve(additional);
        Ok(())
    }

    /// Remove every entry matching `pred`; returns how many were removed.
    pub fn remove_where<F>(&self, mut pred: F) -> Result<usize, CollectionError>
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut core = self.lock_mut()?;
        let _enumerating = self.state.enter();
        Ok(Arc::make_mut(&mut core).retain(|k, v| !pred(k, v)))
    }

    /// Merge `source` into this builder, adding entries whose keys are
    /// absent; returns how many were added. Fails with
    /// [`CollectionError::SelfReferentialMutation`] when `source` shares
    /// this builder's backing storage, leaving the builder unchanged.
    pub fn insert_all(&self, source: &FrozenMap<K, V, S>) -> Result<usize, CollectionError> {
        let mut core = self.lock_mut()?;
        if Arc::ptr_eq(&core, source.core()) {
            return Err(CollectionError::SelfReferentialMutation);
        }
        let dst = Arc::make_mut(&mut core);
        let mut added = 0;
        for (k, v) in source.iter() {
            if dst.insert(k.clone(), v.clone()) {
                added += 1;
            }
        }
        Ok(added)
    }
}

impl<K, V> Default for MapBuilder<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Builds from `(key, value)` pairs; on duplicate keys the first occurrence
/// wins, matching the duplicate-insert no-op policy.
impl<K, V, S> FromIterator<(K, V)> for MapBuilder<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut core = HashCore::with_hasher(S::default());
        for (k, v) in iter {
            core.insert(k, v);
        }
        Self {
            core: RefCell::new(Arc::new(core)),
            state: IterationTracker::new(),
        }
    }
}

impl<K, V, S> fmt::Debug for MapBuilder<K, V, S>
where
    K: fmt::Debug + Eq + Hash,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.borrow();
        f.debug_map().entries(core.entries()).finish()
    }
}

/// Enumeration session over a [`MapBuilder`].
pub struct MapCursor<'a, K, V, S = RandomState> {
    builder: &'a MapBuilder<K, V, S>,
    _guard: IterationGuard<'a>,
    expected_version: u64,
    keys: Vec<DefaultKey>,
    pos: usize,
    current: Option<DefaultKey>,
}

impl<K, V, S> MapCursor<'_, K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Yield the next entry, or `None` when the map is exhausted.
    pub fn next(&mut self) -> Option<(K, V)> {
        let core = self.builder.core.borrow();
        assert_eq!(
            core.version(),
            self.expected_version,
            "builder storage changed behind an active cursor"
        );
        while self.pos < self.keys.len() {
            let k = self.keys[self.pos];
            self.pos += 1;
            if let Some((key, value)) = core.slot(k) {
                self.current = Some(k);
                return Some((key.clone(), value.clone()));
            }
        }
        self.current = None;
        None
    }

    /// Remove the entry most recently yielded by [`next`](Self::next).
    /// The sanctioned in-iteration mutation; refused while another
    /// enumeration over the same builder is active.
    pub fn remove_current(&mut self) -> Result<(K, V), CollectionError> {
        let k = self.current.ok_or(CollectionError::KeyNotFound)?;
        self.builder.state.ensure_solo()?;
        let mut core = self
            .builder
            .core
            .try_borrow_mut()
            .map_err(|_| CollectionError::ConcurrentMutation)?;
        let entry = Arc::make_mut(&mut core)
            .remove_slot(k)
            .ok_or(CollectionError::KeyNotFound)?;
        self.expected_version = core.version();
        self.current = None;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: insert keeps the first value for a key; replace overwrites
    /// existing keys only.
    #[test]
    fn insert_keeps_first_replace_overwrites() {
        let b: MapBuilder<String, i32> = MapBuilder::new();
        assert_eq!(b.insert("k".to_string(), 1), Ok(true));
        assert_eq!(b.insert("k".to_string(), 2), Ok(false));
        assert_eq!(b.get("k"), Some(1));

        assert_eq!(b.replace("k", 9), Ok(1));
        assert_eq!(b.get("k"), Some(9));
        assert_eq!(b.replace("missing", 0), Err(CollectionError::KeyNotFound));
    }

    /// Invariant: a cursor pass with removals keeps the untouched entries.
    #[test]
    fn cursor_remove_current_keeps_rest() {
        let b: MapBuilder<i32, String> = (0..6).map(|i| (i, format!("v{i}"))).collect();
        let mut cur = b.cursor();
        while let Some((k, _)) = cur.next() {
            if k < 2 {
                let (rk, rv) = cur.remove_current().unwrap();
                assert_eq!(rk, k);
                assert_eq!(rv, format!("v{k}"));
            }
        }
        drop(cur);
        assert_eq!(b.len(), 4);
        assert!(!b.contains_key(&0));
        assert!(b.contains_key(&5));
    }

    /// Invariant: replace is a structural-safety-gated mutation; it is
    /// refused during enumeration even for an existing key.
    #[test]
    fn replace_refused_during_enumeration() {
        let b: MapBuilder<i32, i32> = [(1, 10)].into_iter().collect();
        let mut cur = b.cursor();
        let _ = cur.next();
        assert_eq!(b.replace(&1, 99), Err(CollectionError::ConcurrentMutation));
        drop(cur);
        assert_eq!(b.replace(&1, 99), Ok(10));
    }
}
