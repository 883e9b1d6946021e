// FrozenSet / FrozenMap test suite (consolidated).
//
// Core invariants exercised:
// - Value semantics: equality and hashing are order-independent and derive
//   only from contents, never from insertion history, capacity, or slot
//   layout (tombstones are invisible).
// - Duplicate policy: inserting a present key is a no-op that keeps the
//   stored value, does not count as a structural change, and is therefore
//   permitted during enumeration.
// - Enumeration safety: structural mutation during an active cursor fails
//   with ConcurrentMutation; remove_current is the sanctioned exception.
// - Self-reference: merging a builder's own frozen storage into itself is
//   rejected.
use cow_collections::{CollectionError, FrozenMap, FrozenSet, MapBuilder, SetBuilder};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

fn hash_of<T: Hash>(x: &T) -> u64 {
    let mut h = DefaultHasher::new();
    x.hash(&mut h);
    h.finish()
}

// Test: insertion order never affects set equality or hashing.
#[test]
fn set_equality_ignores_insertion_order() {
    let a: FrozenSet<i32> = [1, 2, 3, 4, 5].into_iter().collect();
    let b: FrozenSet<i32> = [5, 4, 3, 2, 1].into_iter().collect();
    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));

    let c: FrozenSet<i32> = [1, 2, 3].into_iter().collect();
    assert_ne!(a, c);
}

// Test: removal history never affects set equality or hashing.
// Verifies: {42} equals ({0, 42} then remove 0) and hashes identically,
// even though the second set carries a tombstoned slot.
#[test]
fn set_equality_ignores_removal_history() {
    let direct: FrozenSet<i32> = [42].into_iter().collect();

    let builder: SetBuilder<i32> = [0, 42].into_iter().collect();
    assert_eq!(builder.remove(&0), Ok(true));
    let via_removal = builder.freeze();

    assert_eq!(direct, via_removal);
    assert_eq!(hash_of(&direct), hash_of(&via_removal));
}

// Test: duplicate elements collapse at construction.
#[test]
fn set_construction_deduplicates() {
    let s: FrozenSet<&'static str> = ["a", "b", "a", "a", "c"].into_iter().collect();
    assert_eq!(s.len(), 3);
    assert!(s.contains("a"));
    assert_eq!(s.get("b"), Some(&"b"));
    assert_eq!(s.get("z"), None);
}

// Test: map equality is key-set plus per-key values, in any order.
#[test]
fn map_equality_ignores_insertion_order() {
    let a: FrozenMap<String, i32> = [("x", 1), ("y", 2), ("z", 3)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    let b: FrozenMap<String, i32> = [("z", 3), ("x", 1), ("y", 2)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));

    // Same keys, one differing value: unequal.
    let c: FrozenMap<String, i32> = [("x", 1), ("y", 2), ("z", 9)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    assert_ne!(a, c);
}

// Test: rebuilding from enumeration round-trips for both kinds.
#[test]
fn rebuild_from_iteration_is_equal() {
    let set: FrozenSet<i32> = (0..64).collect();
    let rebuilt: FrozenSet<i32> = set.iter().copied().collect();
    assert_eq!(set, rebuilt);
    assert_eq!(hash_of(&set), hash_of(&rebuilt));

    let map: FrozenMap<i32, i32> = (0..64).map(|i| (i, i * i)).collect();
    let rebuilt: FrozenMap<i32, i32> = map.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(map, rebuilt);
    assert_eq!(hash_of(&map), hash_of(&rebuilt));
}

// Test: freeze/seed round trip with copy-on-write isolation.
#[test]
fn round_trip_through_builder_preserves_content() {
    let original: FrozenMap<i32, String> = (0..10).map(|i| (i, format!("v{i}"))).collect();
    let builder = original.to_builder();
    assert_eq!(builder.freeze(), original);

    assert_eq!(builder.remove(&0), Ok(Some("v0".to_string())));
    assert_eq!(original.len(), 10, "seed view must be unaffected");
    assert_eq!(builder.freeze().len(), 9);
}

// Test: disallowed mutation during set enumeration.
// Verifies: a novel insert (which may grow the table) fails with
// ConcurrentMutation and the count is exactly what it was before the call.
#[test]
fn set_mutation_during_cursor_fails_without_corruption() {
    let builder: SetBuilder<i32> = (0..32).collect();
    let mut cur = builder.cursor();
    let _ = cur.next();

    let before = builder.len();
    assert_eq!(builder.insert(1000), Err(CollectionError::ConcurrentMutation));
    assert_eq!(builder.len(), before);
    assert_eq!(builder.remove(&0), Err(CollectionError::ConcurrentMutation));
    assert_eq!(builder.len(), before);
    assert_eq!(builder.clear(), Err(CollectionError::ConcurrentMutation));
    assert_eq!(builder.len(), before);

    // Benign duplicate insert stays allowed mid-pass.
    assert_eq!(builder.insert(5), Ok(false));

    drop(cur);
    assert_eq!(builder.insert(1000), Ok(true));
    assert_eq!(builder.len(), before + 1);
}

// Test: disallowed mutation during map enumeration, including replace.
#[test]
fn map_mutation_during_cursor_fails_without_corruption() {
    let builder: MapBuilder<i32, i32> = (0..8).map(|i| (i, i)).collect();
    let mut cur = builder.cursor();
    let _ = cur.next();

    let before = builder.len();
    assert_eq!(
        builder.insert(100, 100),
        Err(CollectionError::ConcurrentMutation)
    );
    assert_eq!(
        builder.replace(&0, 99),
        Err(CollectionError::ConcurrentMutation)
    );
    assert_eq!(builder.remove(&0), Err(CollectionError::ConcurrentMutation));
    assert_eq!(builder.len(), before);
    assert_eq!(builder.insert(3, 777), Ok(false), "duplicate key is benign");
    assert_eq!(builder.get(&3), Some(3), "stored value kept");

    drop(cur);
    assert_eq!(builder.replace(&0, 99), Ok(0));
}

// Test: sanctioned removal over a full set pass.
// Verifies: removing N elements yields initial − N, removed absent, rest
// present.
#[test]
fn set_cursor_remove_current_n_elements() {
    let builder: SetBuilder<i32> = (0..30).collect();
    let mut removed = 0;
    {
        let mut cur = builder.cursor();
        while let Some(x) = cur.next() {
            if x % 5 == 0 {
                assert_eq!(cur.remove_current(), Ok(x));
                removed += 1;
            }
        }
    }
    assert_eq!(removed, 6);
    let frozen = builder.freeze();
    assert_eq!(frozen.len(), 24);
    for x in 0..30 {
        assert_eq!(frozen.contains(&x), x % 5 != 0);
    }
}

// Test: map cursor drain-by-predicate via remove_current.
#[test]
fn map_cursor_remove_current_drains_matching_entries() {
    let builder: MapBuilder<String, i32> = (0..12).map(|i| (format!("k{i}"), i)).collect();
    {
        let mut cur = builder.cursor();
        while let Some((_, v)) = cur.next() {
            if v >= 6 {
                assert!(cur.remove_current().is_ok());
            }
        }
    }
    let frozen = builder.freeze();
    assert_eq!(frozen.len(), 6);
    assert!(frozen.contains_key("k0"));
    assert!(!frozen.contains_key("k11"));
}

// Test: self-referential merge is rejected for sets and maps.
#[test]
fn insert_all_from_self_is_rejected() {
    let set_builder: SetBuilder<i32> = [1, 2, 3].into_iter().collect();
    let own = set_builder.freeze();
    assert_eq!(
        set_builder.insert_all(&own),
        Err(CollectionError::SelfReferentialMutation)
    );
    assert_eq!(set_builder.len(), 3);

    let map_builder: MapBuilder<i32, i32> = [(1, 1)].into_iter().collect();
    let own = map_builder.freeze();
    assert_eq!(
        map_builder.insert_all(&own),
        Err(CollectionError::SelfReferentialMutation)
    );
    assert_eq!(map_builder.len(), 1);
}

// Test: legal merges add only missing entries and report the count.
#[test]
fn insert_all_merges_missing_entries() {
    let set_builder: SetBuilder<i32> = [1, 2, 3].into_iter().collect();
    let other: FrozenSet<i32> = [3, 4, 5].into_iter().collect();
    assert_eq!(set_builder.insert_all(&other), Ok(2));
    assert_eq!(
        set_builder.freeze(),
        [1, 2, 3, 4, 5].into_iter().collect::<FrozenSet<i32>>()
    );

    let map_builder: MapBuilder<i32, &'static str> = [(1, "one")].into_iter().collect();
    let other: FrozenMap<i32, &'static str> =
        [(1, "ONE"), (2, "two")].into_iter().collect();
    assert_eq!(map_builder.insert_all(&other), Ok(1));
    let frozen = map_builder.freeze();
    assert_eq!(frozen.get(&1), Some(&"one"), "existing key keeps its value");
    assert_eq!(frozen.get(&2), Some(&"two"));
}

// Test: map lookup paths, including std-like panicking Index.
#[test]
fn map_access_paths_agree() {
    let map: FrozenMap<String, i32> = [("a".to_string(), 1), ("b".to_string(), 2)]
        .into_iter()
        .collect();
    assert_eq!(map.get("a"), Some(&1));
    assert_eq!(map.get_key_value("b"), Some((&"b".to_string(), &2)));
    assert_eq!(map["a"], 1);
    assert!(map.contains_key("b"));
    assert!(!map.contains_key("c"));
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    assert_eq!(keys, [&"a".to_string(), &"b".to_string()]);
    assert_eq!(map.values().sum::<i32>(), 3);
}

#[test]
#[should_panic(expected = "no entry found for key")]
fn map_indexing_missing_key_panics() {
    let map: FrozenMap<String, i32> = [("a".to_string(), 1)].into_iter().collect();
    let _ = map["missing"];
}

// Test: frozen views are safe for unrestricted concurrent reads.
#[test]
fn views_are_readable_from_many_threads() {
    let map: FrozenMap<i32, i32> = (0..500).map(|i| (i, i * 2)).collect();
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for i in 0..500 {
                    assert_eq!(map.get(&i), Some(&(i * 2)));
                }
            });
        }
    });
}

// Test: remove_where over both kinds reports counts and filters correctly.
#[test]
fn remove_where_filters_by_predicate() {
    let set_builder: SetBuilder<i32> = (0..20).collect();
    assert_eq!(set_builder.remove_where(|x| x % 4 == 0), Ok(5));
    assert_eq!(set_builder.len(), 15);
    assert!(!set_builder.contains(&16));

    let map_builder: MapBuilder<i32, i32> = (0..20).map(|i| (i, i * 10)).collect();
    assert_eq!(map_builder.remove_where(|_, v| *v >= 100), Ok(10));
    assert_eq!(map_builder.len(), 10);
    assert!(map_builder.contains_key(&9));
    assert!(!map_builder.contains_key(&10));
}
