//! Immutable sequence, its builder, and the sequence cursor.

use core::cell::{RefCell, RefMut};
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::{Index, Range};
use std::sync::{Arc, OnceLock};

use crate::error::CollectionError;
use crate::iteration::{IterationGuard, IterationTracker};
use crate::seq_core::SeqCore;
use crate::structural;

/// An immutable, value-equality sequence.
///
/// Wraps a frozen storage snapshot behind a shared handle. The snapshot is
/// never mutated after construction — there is no mutation API on this type —
/// so a `FrozenSeq` is safe for unrestricted concurrent reads and its
/// iterators are restartable. To modify, seed a [`SeqBuilder`] via
/// [`to_builder`](FrozenSeq::to_builder) and freeze a new snapshot; the
/// builder pays a private copy only on its first mutation.
pub struct FrozenSeq<T> {
    core: Arc<SeqCore<T>>,
    hash_cache: OnceLock<u64>,
}

impl<T> FrozenSeq<T> {
    pub fn new() -> Self {
        Self::from_core(Arc::new(SeqCore::new()))
    }

    pub(crate) fn from_core(core: Arc<SeqCore<T>>) -> Self {
        Self {
            core,
            hash_cache: OnceLock::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.core.get(index)
    }

    pub fn as_slice(&self) -> &[T] {
        self.core.as_slice()
    }

    /// Restartable in-order iteration over the snapshot.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.core.as_slice().iter()
    }

    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.core.as_slice().contains(item)
    }

    /// A read-only window over this sequence's backing storage. The slice is
    /// a pass-through wrapper: bulk copies resolve it to the underlying
    /// snapshot when checking for self-referential sources.
    pub fn slice(&self, range: Range<usize>) -> Result<SeqSlice<T>, CollectionError> {
        if range.start > range.end || range.end > self.len() {
            return Err(CollectionError::IndexOutOfRange {
                index: range.end,
                len: self.len(),
            });
        }
        Ok(SeqSlice {
            source: Arc::clone(&self.core),
            start: range.start,
            end: range.end,
        })
    }

    /// Seed a builder from this snapshot. O(1): storage is shared until the
    /// builder's first mutation.
    pub fn to_builder(&self) -> SeqBuilder<T> {
        SeqBuilder {
            core: RefCell::new(Arc::clone(&self.core)),
            state: IterationTracker::new(),
        }
    }

    fn aggregate_hash(&self) -> u64
    where
        T: Hash,
    {
        *self
            .hash_cache
            .get_or_init(|| structural::ordered_hash(self.core.len(), self.core.as_slice().iter()))
    }
}

impl<T> Clone for FrozenSeq<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            hash_cache: self.hash_cache.clone(),
        }
    }
}

impl<T> Default for FrozenSeq<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq> PartialEq for FrozenSeq<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core) || self.core.as_slice() == other.core.as_slice()
    }
}

impl<T: Eq> Eq for FrozenSeq<T> {}

impl<T: Hash> Hash for FrozenSeq<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.aggregate_hash());
    }
}

impl<T: fmt::Debug> fmt::Debug for FrozenSeq<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.core.as_slice()).finish()
    }
}

impl<T> Index<usize> for FrozenSeq<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.core.as_slice()[index]
    }
}

impl<T> FromIterator<T> for FrozenSeq<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_core(Arc::new(SeqCore::from_vec(iter.into_iter().collect())))
    }
}

impl<T> From<Vec<T>> for FrozenSeq<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_core(Arc::new(SeqCore::from_vec(items)))
    }
}

impl<'a, T> IntoIterator for &'a FrozenSeq<T> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A read-only window over a [`FrozenSeq`], sharing its backing storage.
pub struct SeqSlice<T> {
    source: Arc<SeqCore<T>>,
    start: usize,
    end: usize,
}

impl<T> SeqSlice<T> {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.source.as_slice()[self.start..self.end]
    }

    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.as_slice().iter()
    }
}

impl<T> Clone for SeqSlice<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            start: self.start,
            end: self.end,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SeqSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A readable source for bulk sequence copies. Implemented by [`FrozenSeq`]
/// and [`SeqSlice`]; wrappers report the identity of the storage they
/// ultimately read from, so a copy-to-self cannot hide behind an adapter.
pub trait SeqSource<T>: sealed::Sealed {
    #[doc(hidden)]
    fn backing_id(&self) -> *const ();
    #[doc(hidden)]
    fn elements(&self) -> &[T];
}

impl<T> sealed::Sealed for FrozenSeq<T> {}

impl<T> SeqSource<T> for FrozenSeq<T> {
    fn backing_id(&self) -> *const () {
        Arc::as_ptr(&self.core) as *const ()
    }

    fn elements(&self) -> &[T] {
        self.core.as_slice()
    }
}

impl<T> sealed::Sealed for SeqSlice<T> {}

impl<T> SeqSource<T> for SeqSlice<T> {
    fn backing_id(&self) -> *const () {
        // Resolve through the wrapper to the storage it reads from.
        Arc::as_ptr(&self.source) as *const ()
    }

    fn elements(&self) -> &[T] {
        self.as_slice()
    }
}

/// Mutable staging structure producing [`FrozenSeq`] snapshots.
///
/// Single-owner and single-threaded: mutation goes through interior
/// mutability so that enumeration-safety checks stay dynamic, and the type is
/// `!Sync` by construction. Mutating calls return
/// [`CollectionError::ConcurrentMutation`] while a [`SeqCursor`] is active;
/// the one sanctioned exception is [`SeqCursor::remove_current`]. Read
/// accessors fail fast (borrow panic) only if called re-entrantly from inside
/// a mutation callback.
pub struct SeqBuilder<T> {
    core: RefCell<Arc<SeqCore<T>>>,
    state: IterationTracker,
}

impl<T> SeqBuilder<T> {
    pub fn new() -> Self {
        Self {
            core: RefCell::new(Arc::new(SeqCore::new())),
            state: IterationTracker::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            core: RefCell::new(Arc::new(SeqCore::with_capacity(capacity))),
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

    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.core.borrow().as_slice().contains(item)
    }

    pub fn get(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        self.core.borrow().get(index).cloned()
    }

    /// Freeze the current contents into an immutable snapshot. O(1): no
    /// element is copied; the next mutation pays the private copy instead.
    pub fn freeze(&self) -> FrozenSeq<T> {
        FrozenSeq::from_core(Arc::clone(&self.core.borrow()))
    }

    /// Begin an enumeration session over the current contents.
    pub fn cursor(&self) -> SeqCursor<'_, T> {
        let guard = self.state.enter();
        let version = self.core.borrow().version();
        SeqCursor {
            builder: self,
            _guard: guard,
            expected_version: version,
            next_index: 0,
            current: None,
        }
    }

    // Gate for structural mutation: refused while any enumeration is active
    // or when re-entered from a callback mid-operation.
    fn lock_mut(&self) -> Result<RefMut<'_, Arc<SeqCore<T>>>, CollectionError> {
        self.state.ensure_idle()?;
        self.core
            .try_borrow_mut()
            .map_err(|_| CollectionError::ConcurrentMutation)
    }
}

impl<T: Clone> SeqBuilder<T> {
    pub fn push(&self, item: T) -> Result<(), CollectionError> {
        let mut core = self.lock_mut()?;
        Arc::make_mut(&mut core).push(item);
        Ok(())
    }

    pub fn insert(&self, index: usize, item: T) -> Result<(), CollectionError> {
        let mut core = self.lock_mut()?;
        let len = core.len();
        if index > len {
            return Err(CollectionError::IndexOutOfRange { index, len });
        }
        Arc::make_mut(&mut core).insert(index, item);
        Ok(())
    }

    pub fn remove_at(&self, index: usize) -> Result<T, CollectionError> {
        let mut core = self.lock_mut()?;
        let len = core.len();
        if index >= len {
            return Err(CollectionError::IndexOutOfRange { index, len });
        }
        Ok(Arc::make_mut(&mut core).remove(index))
    }

    /// Replace the element at `index`, returning the previous one.
    pub fn set(&self, index: usize, item: T) -> Result<T, CollectionError> {
        let mut core = self.lock_mut()?;
        let len = core.len();
        if index >= len {
            return Err(CollectionError::IndexOutOfRange { index, len });
        }
        Ok(Arc::make_mut(&mut core).replace(index, item))
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
    /// The pass counts as an enumeration, so a callback that re-enters the
    /// builder gets `ConcurrentMutation` instead of corrupting the pass.
    pub fn remove_where<F>(&self, mut pred: F) -> Result<usize, CollectionError>
    where
        F: FnMut(&T) -> bool,
    {
        let mut core = self.lock_mut()?;
        let _enumerating = self.state.enter();
        Ok(Arc::make_mut(&mut core).retain(|x| !pred(x)))
    }

    /// Bulk-insert `source`'s elements at `index`. Fails with
    /// [`CollectionError::SelfReferentialMutation`] when the source reads
    /// from this builder's own backing storage (directly or through a
    /// wrapper), leaving the builder unchanged.
    pub fn insert_all<S>(&self, index: usize, source: &S) -> Result<(), CollectionError>
    where
        S: SeqSource<T>,
    {
        let mut core = self.lock_mut()?;
        if source.backing_id() == Arc::as_ptr(&core) as *const () {
            return Err(CollectionError::SelfReferentialMutation);
        }
        let len = core.len();
        if index > len {
            return Err(CollectionError::IndexOutOfRange { index, len });
        }
        Arc::make_mut(&mut core).splice_at(index, source.elements());
        Ok(())
    }
}

impl<T> Default for SeqBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for SeqBuilder<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            core: RefCell::new(Arc::new(SeqCore::from_vec(iter.into_iter().collect()))),
            state: IterationTracker::new(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SeqBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.core.borrow().as_slice()).finish()
    }
}

/// Enumeration session over a [`SeqBuilder`].
///
/// Holding a cursor puts the builder in the Enumerating state; dropping it
/// leaves the state. Each step re-fetches storage from the owning builder and
/// revalidates the version stamp captured at entry rather than trusting a
/// cached reference.
pub struct SeqCursor<'a, T> {
    builder: &'a SeqBuilder<T>,
    _guard: IterationGuard<'a>,
    expected_version: u64,
    next_index: usize,
    current: Option<usize>,
}

impl<T: Clone> SeqCursor<'_, T> {
    /// Yield the next element, or `None` when the sequence is exhausted.
    pub fn next(&mut self) -> Option<T> {
        let core = self.builder.core.borrow();
        assert_eq!(
            core.version(),
            self.expected_version,
            "builder storage changed behind an active cursor"
        );
        if self.next_index >= core.len() {
            self.current = None;
            return None;
        }
        let item = core.get(self.next_index).cloned();
        self.current = Some(self.next_index);
        self.next_index += 1;
        item
    }

    /// Remove the element most recently yielded by [`next`](Self::next).
    ///
    /// This is the one sanctioned in-iteration mutation: the cursor adjusts
    /// so no element is skipped or revisited, and the version stamp is
    /// re-synced (the removal is cooperative, not a staleness hazard). It is
    /// refused while another enumeration over the same builder is active.
    pub fn remove_current(&mut self) -> Result<T, CollectionError> {
        let at = match self.current {
            Some(at) => at,
            None => {
                let len = self.builder.core.borrow().len();
                return Err(CollectionError::IndexOutOfRange {
                    index: self.next_index,
                    len,
                });
            }
        };
        self.builder.state.ensure_solo()?;
        let mut core = self
            .builder
            .core
            .try_borrow_mut()
            .map_err(|_| CollectionError::ConcurrentMutation)?;
        let item = Arc::make_mut(&mut core).remove(at);
        self.expected_version = core.version();
        // The tail shifted left; the next element now lives at `at`.
        self.next_index = at;
        self.current = None;
        Ok(item)
    }
}
