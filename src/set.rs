//! Immutable hash set, its builder, and the set cursor.

use core::borrow::Borrow;
use core::cell::{RefCell, RefMut};
use core::fmt;
use core::hash::{BuildHasher, Hash, Hasher};
use slotmap::DefaultKey;
use std::collections::hash_map::RandomState;
use std::sync::{Arc, OnceLock};

use crate::error::CollectionError;
use crate::hash_core::{Entries, HashCore};
use crate::iteration::{IterationGuard, IterationTracker};
use crate::structural;

/// An immutable, value-equality hash set.
///
/// Equality is cardinality plus mutual containment; hashing is
/// order-independent. Enumeration order is unspecified but stable for a
/// given snapshot. There is no mutation API: to modify, seed a
/// [`SetBuilder`] via [`to_builder`](FrozenSet::to_builder) and freeze a new
/// snapshot.
pub struct FrozenSet<T, S = RandomState> {
    core: Arc<HashCore<T, (), S>>,
    hash_cache: OnceLock<u64>,
}

impl<T, S> FrozenSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.is_empty()
    }

    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.core.contains(item)
    }

    /// Borrow the stored element equal to `item`, if present.
    pub fn get<Q>(&self, item: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.core.get_entry(item).map(|(k, _)| k)
    }

    /// Restartable iteration over the snapshot, in unspecified order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.core.entries(),
        }
    }

    pub(crate) fn core(&self) -> &Arc<HashCore<T, (), S>> {
        &self.core
    }

    pub(crate) fn from_core(core: Arc<HashCore<T, (), S>>) -> Self {
        Self {
            core,
            hash_cache: OnceLock::new(),
        }
    }

    fn aggregate_hash(&self) -> u64 {
        *self.hash_cache.get_or_init(|| {
            structural::unordered_hash(
                self.core.len(),
                self.core.entries().map(|(k, _)| structural::element_hash(k)),
            )
        })
    }
}

impl<T, S> FrozenSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher + Clone,
{
    /// Seed a builder from this snapshot. O(1): storage is shared until the
    /// builder's first mutation.
    pub fn to_builder(&self) -> SetBuilder<T, S> {
        SetBuilder {
            core: RefCell::new(Arc::clone(&self.core)),
            state: IterationTracker::new(),
        }
    }
}

impl<T, S> Clone for FrozenSet<T, S> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            hash_cache: self.hash_cache.clone(),
        }
    }
}

impl<T, S> Default for FrozenSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::from_core(Arc::new(HashCore::with_hasher(S::default())))
    }
}

impl<T, S> PartialEq for FrozenSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.core, &other.core) {
            return true;
        }
        self.len() == other.len() && self.iter().all(|x| other.core.contains(x))
    }
}

impl<T, S> Eq for FrozenSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
}

impl<T, S> Hash for FrozenSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.aggregate_hash());
    }
}

impl<T, S> fmt::Debug for FrozenSet<T, S>
where
    T: fmt::Debug + Eq + Hash,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, S> FromIterator<T> for FrozenSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut core = HashCore::with_hasher(S::default());
        for item in iter {
            core.insert(item, ());
        }
        Self::from_core(Arc::new(core))
    }
}

impl<'a, T, S> IntoIterator for &'a FrozenSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`FrozenSet`].
pub struct Iter<'a, T> {
    inner: Entries<'a, T, ()>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }
}

/// Mutable staging structure producing [`FrozenSet`] snapshots.
///
/// Same contract as [`SeqBuilder`](crate::SeqBuilder): single-owner,
/// `!Sync`, dynamic enumeration-safety checks. Re-inserting an element that
/// is already present is a version-neutral no-op and therefore permitted
/// even while a cursor is active.
pub struct SetBuilder<T, S = RandomState> {
    core: RefCell<Arc<HashCore<T, (), S>>>,
    state: IterationTracker,
}

impl<T> SetBuilder<T>
where
    T: Eq + Hash,
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

impl<T, S> SetBuilder<T, S>
where
    T: Eq + Hash,
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

    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.core.borrow().contains(item)
    }

    /// Freeze the current contents into an immutable snapshot. O(1).
    pub fn freeze(&self) -> FrozenSet<T, S> {
        FrozenSet::from_core(Arc::clone(&self.core.borrow()))
    }

    /// Begin an enumeration session over the current contents.
    pub fn cursor(&self) -> SetCursor<'_, T, S> {
        let guard = self.state.enter();
        let core = self.core.borrow();
        SetCursor {
            builder: self,
            _guard: guard,
            expected_version: core.version(),
            keys: core.slot_keys(),
            pos: 0,
            current: None,
        }
    }

    fn lock_mut(&self) -> Result<RefMut<'_, Arc<HashCore<T, (), S>>>, CollectionError> {
        self.state.ensure_idle()?;
        self.core
            .try_borrow_mut()
            .map_err(|_| CollectionError::ConcurrentMutation)
    }
}

impl<T, S> SetBuilder<T, S>
where
    T: Eq + Hash + Clone,
    S: BuildHasher + Clone,
{
    /// Insert `item`; `Ok(false)` when it was already present. The no-op
    /// path is not a structural change, so it succeeds even while an
    /// enumeration is active.
    pub fn insert(&self, item: T) -> Result<bool, CollectionError> {
        if self.state.depth() > 0 {
            let core = self
                .core
                .try_borrow()
                .map_err(|_| CollectionError::ConcurrentMutation)?;
            return if core.contains(&item) {
                Ok(false)
            } else {
                Err(CollectionError::ConcurrentMutation)
            };
        }
        let mut core = self
            .core
            .try_borrow_mut()
            .map_err(|_| CollectionError::ConcurrentMutation)?;
        Ok(Arc::make_mut(&mut core).insert(item, ()))
    }

    /// Remove `item`; `Ok(false)` when it was not present.
    pub fn remove<Q>(&self, item: &Q) -> Result<bool, CollectionError>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let mut core = self.lock_mut()?;
        Ok(Arc::make_mut(&mut core).remove(item).is_some())
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

    /// Remove every element matching `pred`; returns how many were removed.
    pub fn remove_where<F>(&self, mut pred: F) -> Result<usize, CollectionError>
    where
        F: FnMut(&T) -> bool,
    {
        let mut core = self.lock_mut()?;
        let _enumerating = self.state.enter();
        Ok(Arc::make_mut(&mut core).retain(|k, _| !pred(k)))
    }

    /// Union `source` into this builder; returns how many elements were
    /// actually added. Fails with
    /// [`CollectionError::SelfReferentialMutation`] when `source` shares
    /// this builder's backing storage, leaving the builder unchanged.
    pub fn insert_all(&self, source: &FrozenSet<T, S>) -> Result<usize, CollectionError> {
        let mut core = self.lock_mut()?;
        if Arc::ptr_eq(&core, source.core()) {
            return Err(CollectionError::SelfReferentialMutation);
        }
        let dst = Arc::make_mut(&mut core);
        let mut added = 0;
        for item in source.iter() {
            if dst.insert(item.clone(), ()) {
                added += 1;
            }
        }
        Ok(added)
    }
}

impl<T> Default for SetBuilder<T>
where
    T: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> FromIterator<T> for SetBuilder<T, S>
where
    T: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut core = HashCore::with_hasher(S::default());
        for item in iter {
            core.insert(item, ());
        }
        Self {
            core: RefCell::new(Arc::new(core)),
            state: IterationTracker::new(),
        }
    }
}

impl<T, S> fmt::Debug for SetBuilder<T, S>
where
    T: fmt::Debug + Eq + Hash,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.borrow();
        f.debug_set().entries(core.entries().map(|(k, _)| k)).finish()
    }
}

/// Enumeration session over a [`SetBuilder`].
///
/// The cursor snapshots the slot keys at entry and re-fetches storage from
/// the owning builder on every step, revalidating the version stamp.
pub struct SetCursor<'a, T, S = RandomState> {
    builder: &'a SetBuilder<T, S>,
    _guard: IterationGuard<'a>,
    expected_version: u64,
    keys: Vec<DefaultKey>,
    pos: usize,
    current: Option<DefaultKey>,
}

impl<T, S> SetCursor<'_, T, S>
where
    T: Eq + Hash + Clone,
    S: BuildHasher + Clone,
{
    /// Yield the next element, or `None` when the set is exhausted.
    pub fn next(&mut self) -> Option<T> {
        let core = self.builder.core.borrow();
        assert_eq!(
            core.version(),
            self.expected_version,
            "builder storage changed behind an active cursor"
        );
        while self.pos < self.keys.len() {
            let k = self.keys[self.pos];
            self.pos += 1;
            if let Some((item, _)) = core.slot(k) {
                self.current = Some(k);
                return Some(item.clone());
            }
        }
        self.current = None;
        None
    }

    /// Remove the element most recently yielded by [`next`](Self::next).
    /// The sanctioned in-iteration mutation; refused while another
    /// enumeration over the same builder is active.
    pub fn remove_current(&mut self) -> Result<T, CollectionError> {
        let k = self.current.ok_or(CollectionError::KeyNotFound)?;
        self.builder.state.ensure_solo()?;
        let mut core = self
            .builder
            .core
            .try_borrow_mut()
            .map_err(|_| CollectionError::ConcurrentMutation)?;
        let (item, ()) = Arc::make_mut(&mut core)
            .remove_slot(k)
            .ok_or(CollectionError::KeyNotFound)?;
        self.expected_version = core.version();
        self.current = None;
        Ok(item)
    }
}
