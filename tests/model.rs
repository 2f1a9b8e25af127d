//! Model tests: both trees against std collections under random operation
//! sequences, with invariant checks along the way.

use bptstore::{BTree, MultiBTree, TreeConfig};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tempfile::TempDir;

#[derive(Debug, Clone)]
enum UniqueOp {
    Insert(u16, u32),
    Erase(u16),
    Find(u16),
    Range(u16, u16),
    Reopen,
}

#[derive(Debug, Clone)]
enum MultiOp {
    Insert(u8, u16),
    Erase(u8, u16),
    Find(u8),
    Reopen,
}

fn arb_unique_op() -> impl Strategy<Value = UniqueOp> {
    prop_oneof![
        6 => (0u16..300, any::<u32>()).prop_map(|(k, v)| UniqueOp::Insert(k, v)),
        3 => (0u16..300).prop_map(UniqueOp::Erase),
        2 => (0u16..300).prop_map(UniqueOp::Find),
        1 => (0u16..300, 0u16..300).prop_map(|(a, b)| UniqueOp::Range(a, b)),
        1 => Just(UniqueOp::Reopen),
    ]
}

fn arb_multi_op() -> impl Strategy<Value = MultiOp> {
    prop_oneof![
        6 => (0u8..20, 0u16..40).prop_map(|(k, v)| MultiOp::Insert(k, v)),
        3 => (0u8..20, 0u16..40).prop_map(|(k, v)| MultiOp::Erase(k, v)),
        2 => (0u8..20).prop_map(MultiOp::Find),
        1 => Just(MultiOp::Reopen),
    ]
}

fn config(cache: usize) -> TreeConfig {
    TreeConfig::for_testing().with_cache_capacity(cache)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_unique_tree_matches_btreemap(
        ops in prop::collection::vec(arb_unique_op(), 1..400),
        cache in 1usize..12,
    ) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("unique");
        let mut tree = BTree::<u16, u32>::open(&path, config(cache)).unwrap();
        let mut model = BTreeMap::new();

        for (i, op) in ops.into_iter().enumerate() {
            match op {
                UniqueOp::Insert(k, v) => {
                    let inserted = tree.insert(k, v).unwrap();
                    prop_assert_eq!(inserted, !model.contains_key(&k));
                    model.entry(k).or_insert(v);
                }
                UniqueOp::Erase(k) => {
                    prop_assert_eq!(tree.erase(&k).unwrap(), model.remove(&k));
                }
                UniqueOp::Find(k) => {
                    prop_assert_eq!(tree.find(&k).unwrap(), model.get(&k).copied());
                }
                UniqueOp::Range(a, b) => {
                    let expected: Vec<_> = if a <= b {
                        model.range(a..=b).map(|(k, v)| (*k, *v)).collect()
                    } else {
                        Vec::new()
                    };
                    prop_assert_eq!(tree.range(&a, &b).unwrap(), expected);
                }
                UniqueOp::Reopen => {
                    tree.close().unwrap();
                    tree = BTree::open(&path, config(cache)).unwrap();
                }
            }
            if i % 25 == 0 {
                tree.check_invariants().unwrap();
            }
        }

        let stats = tree.check_invariants().unwrap();
        prop_assert_eq!(stats.entries, model.len());
        let all: Vec<_> = model.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(tree.iter_all().unwrap(), all);
        prop_assert_eq!(tree.min_key().unwrap(), model.keys().next().copied());
        prop_assert_eq!(tree.max_key().unwrap(), model.keys().next_back().copied());
        tree.close().unwrap();
    }

    #[test]
    fn prop_multi_tree_matches_btreeset(
        ops in prop::collection::vec(arb_multi_op(), 1..400),
        cache in 1usize..12,
    ) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("multi");
        let mut tree = MultiBTree::<u8, u16>::open(&path, config(cache)).unwrap();
        let mut model = BTreeSet::new();

        for (i, op) in ops.into_iter().enumerate() {
            match op {
                MultiOp::Insert(k, v) => {
                    prop_assert_eq!(tree.insert(k, v).unwrap(), model.insert((k, v)));
                }
                MultiOp::Erase(k, v) => {
                    prop_assert_eq!(tree.erase(&k, &v).unwrap(), model.remove(&(k, v)));
                }
                MultiOp::Find(k) => {
                    let expected: Vec<u16> = model
                        .range((k, u16::MIN)..=(k, u16::MAX))
                        .map(|(_, v)| *v)
                        .collect();
                    prop_assert_eq!(tree.find(&k).unwrap(), expected);
                }
                MultiOp::Reopen => {
                    tree.close().unwrap();
                    tree = MultiBTree::open(&path, config(cache)).unwrap();
                }
            }
            if i % 25 == 0 {
                tree.check_invariants().unwrap();
            }
        }

        prop_assert_eq!(tree.check_invariants().unwrap().entries, model.len());
        prop_assert_eq!(tree.iter_all().unwrap(), model.iter().copied().collect::<Vec<_>>());
        tree.close().unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_larger_degree_keeps_occupancy(
        keys in prop::collection::vec(0u32..5000, 1..1500),
        degree in prop::sample::select(vec![4usize, 6, 8, 16]),
    ) {
        let dir = TempDir::new().unwrap();
        let config = TreeConfig::for_testing().with_degree(degree);
        let mut tree = BTree::<u32, u32>::open(dir.path().join("degree"), config).unwrap();
        let mut model = BTreeSet::new();

        for k in &keys {
            tree.insert(*k, *k).unwrap();
            model.insert(*k);
        }
        tree.check_invariants().unwrap();

        for k in keys.iter().step_by(2) {
            tree.erase(k).unwrap();
            model.remove(k);
        }
        let stats = tree.check_invariants().unwrap();
        prop_assert_eq!(stats.entries, model.len());
        prop_assert_eq!(tree.degree(), degree);
        tree.close().unwrap();
    }
}
