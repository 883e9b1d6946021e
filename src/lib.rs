//! cow-collections: immutable, value-equality collections with
//! copy-on-write builders and deterministic enumeration-safety failures.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build the frozen collection types in safe, verifiable layers so
//!   each piece can be reasoned about independently.
//! - Layers:
//!   - SeqCore<T> / HashCore<K, V, S>: storage layer owning the backing
//!     buffer or index + slot arena, plus the `version` stamp that changes
//!     iff logical contents or capacity change.
//!   - FrozenSeq / FrozenSet / FrozenMap: immutable views wrapping an
//!     `Arc`-shared storage snapshot with a lazily-cached aggregate hash;
//!     no mutation API exists on these types by construction.
//!   - SeqBuilder / SetBuilder / MapBuilder: single-owner staging objects
//!     with copy-on-write storage and an iteration tracker that converts
//!     mutation-during-enumeration into `CollectionError::ConcurrentMutation`.
//!
//! Constraints
//! - Builders are single-threaded: interior mutability (`RefCell`/`Cell`)
//!   makes them `!Sync` by design; simultaneous mutation from several
//!   threads needs external synchronization and is a documented contract,
//!   not an internal lock.
//! - Views are never mutated after construction, so they are `Send + Sync`
//!   whenever their elements are, and support unrestricted concurrent reads.
//! - No operation blocks, suspends, or performs I/O.
//!
//! Value semantics
//! - Equality and hashing are structural: sequences compare element-wise in
//!   order; sets by cardinality and mutual containment; maps by key sets and
//!   per-key values. Set/map aggregate hashes combine per-entry hashes
//!   commutatively, so insertion order and slot layout never affect them.
//!   Equal containers hash equal.
//!
//! Freeze and copy-on-write
//! - `freeze()` is O(1): the builder hands out a new view sharing its
//!   storage. The first mutation after a freeze (or after seeding a builder
//!   from a view) pays a one-time private copy, decided by the storage
//!   handle's strong count.
//!
//! Enumeration safety
//! - A builder cursor enters the Enumerating state; while any cursor is
//!   active, every structural mutation fails loudly with
//!   `ConcurrentMutation` instead of corrupting the pass. The one sanctioned
//!   exception is the cursor's own `remove_current`, which adjusts the pass
//!   so nothing is skipped or revisited. Re-inserting an already-present
//!   set/map key is a no-op, not a structural change, and stays permitted.
//! - Cursors re-fetch storage from the owning builder on every step and
//!   revalidate a `version` stamp captured at entry; a stale cached buffer
//!   reference is never trusted across a capacity change.
//! - Bulk copies (`insert_all`) resolve their source to the storage it
//!   ultimately reads from, through pass-through wrappers such as
//!   `SeqSlice`, and fail with `SelfReferentialMutation` when that storage
//!   is the destination's own.
//!
//! Hasher and rehashing invariants
//! - Hash-based cores store a precomputed `u64` hash per slot and always
//!   index by the stored hash; `K: Hash` is never invoked after insertion,
//!   so growth and rehashing never call back into user code.
//!
//! Notes and non-goals
//! - Not a persistent-data-structure library: no structural-sharing trees;
//!   sharing is whole-snapshot copy-on-write.
//! - No serialization adapters; consumers round-trip through `iter()` and
//!   the bulk constructors.
//! - Sequences preserve index order; set/map enumeration order is
//!   unspecified but stable for an unchanged snapshot.

mod error;
mod hash_core;
mod iteration;
pub mod map;
pub mod seq;
mod seq_core;
pub mod set;
mod structural;

// Public surface
pub use error::CollectionError;
pub use map::{FrozenMap, MapBuilder, MapCursor};
pub use seq::{FrozenSeq, SeqBuilder, SeqCursor, SeqSlice, SeqSource};
pub use set::{FrozenSet, SetBuilder, SetCursor};
