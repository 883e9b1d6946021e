//! Structural hashing helpers.
//!
//! Aggregate hashes must agree across containers that compare equal, even
//! though each container owns its own randomly-seeded lookup hasher. So
//! per-element hashes here use `DefaultHasher::new()`, whose keys are fixed
//! within a process, never the container's `RandomState`.
//!
//! Sequence aggregates fold elements in order (order-sensitive). Set and map
//! aggregates are commutative wrapping sums of per-entry hashes, so insertion
//! order and slot layout never leak into the result.

use core::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;

pub(crate) fn element_hash<T>(x: &T) -> u64
where
    T: ?Sized + Hash,
{
    let mut h = DefaultHasher::new();
    x.hash(&mut h);
    h.finish()
}

pub(crate) fn pair_hash<K, V>(key: &K, value: &V) -> u64
where
    K: Hash,
    V: Hash,
{
    let mut h = DefaultHasher::new();
    key.hash(&mut h);
    value.hash(&mut h);
    h.finish()
}

/// Order-sensitive aggregate for sequences.
pub(crate) fn ordered_hash<'a, T, I>(len: usize, items: I) -> u64
where
    T: Hash + 'a,
    I: Iterator<Item = &'a T>,
{
    let mut h = DefaultHasher::new();
    len.hash(&mut h);
    for x in items {
        x.hash(&mut h);
    }
    h.finish()
}

/// Order-independent aggregate for sets and maps: a commutative sum of
/// per-entry hashes, finalized together with the cardinality.
pub(crate) fn unordered_hash<I>(len: usize, entry_hashes: I) -> u64
where
    I: Iterator<Item = u64>,
{
    let mut sum = 0u64;
    for e in entry_hashes {
        sum = sum.wrapping_add(e);
    }
    let mut h = DefaultHasher::new();
    len.hash(&mut h);
    sum.hash(&mut h);
    h.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_hash_is_deterministic() {
        assert_eq!(element_hash(&"abc"), element_hash(&"abc"));
        assert_ne!(element_hash(&"abc"), element_hash(&"abd"));
    }

    #[test]
    fn ordered_hash_is_order_sensitive() {
        let a = [1, 2, 3];
        let b = [3, 2, 1];
        assert_eq!(ordered_hash(3, a.iter()), ordered_hash(3, a.iter()));
        assert_ne!(ordered_hash(3, a.iter()), ordered_hash(3, b.iter()));
    }

    #[test]
    fn unordered_hash_ignores_order() {
        let a = [element_hash(&1), element_hash(&2), element_hash(&3)];
        let b = [element_hash(&3), element_hash(&1), element_hash(&2)];
        assert_eq!(
            unordered_hash(3, a.iter().copied()),
            unordered_hash(3, b.iter().copied())
        );
    }

    #[test]
    fn unordered_hash_folds_in_cardinality() {
        // {0} and {} must not collide just because 0 sums to nothing.
        assert_ne!(unordered_hash(0, [].into_iter()), unordered_hash(1, [0u64].into_iter()));
    }

    #[test]
    fn pair_hash_distinguishes_key_and_value_roles() {
        assert_ne!(pair_hash(&1, &2), pair_hash(&2, &1));
        assert_eq!(pair_hash(&1, &2), pair_hash(&1, &2));
    }
}
