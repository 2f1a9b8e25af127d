//! End-to-end behaviour of both trees at degree 4, where every structural
//! change happens after a handful of operations.

use bptstore::{BTree, FixedStr, MultiBTree, TreeConfig};
use tempfile::TempDir;

type Tag = FixedStr<4>;

fn tag(s: &str) -> Tag {
    Tag::new(s).unwrap()
}

fn unique_tree<V: bptstore::BTreeValue>(dir: &TempDir, name: &str) -> BTree<u64, V> {
    BTree::open(dir.path().join(name), TreeConfig::for_testing()).unwrap()
}

#[test]
fn insert_find_erase_scenario() {
    let dir = TempDir::new().unwrap();
    let mut tree = unique_tree::<Tag>(&dir, "basic");

    tree.insert(5, tag("a")).unwrap();
    tree.insert(3, tag("b")).unwrap();
    tree.insert(8, tag("c")).unwrap();
    assert_eq!(tree.find(&3).unwrap(), Some(tag("b")));

    tree.erase(&5).unwrap();
    assert_eq!(tree.find(&5).unwrap(), None);
    assert_eq!(tree.iter_all().unwrap(), vec![(3, tag("b")), (8, tag("c"))]);
    tree.close().unwrap();
}

#[test]
fn multi_value_scenario() {
    let dir = TempDir::new().unwrap();
    let mut tree = MultiBTree::<Tag, u32>::open(dir.path().join("multi"), TreeConfig::for_testing()).unwrap();

    tree.insert(tag("X"), 1).unwrap();
    tree.insert(tag("X"), 2).unwrap();
    tree.insert(tag("Y"), 1).unwrap();
    assert_eq!(tree.find(&tag("X")).unwrap(), vec![1, 2]);

    tree.erase(&tag("X"), &1).unwrap();
    assert_eq!(tree.find(&tag("X")).unwrap(), vec![2]);
    assert_eq!(tree.find(&tag("Y")).unwrap(), vec![1]);
    tree.close().unwrap();
}

#[test]
fn fifth_insert_splits_the_root_leaf() {
    let dir = TempDir::new().unwrap();
    let mut tree = unique_tree::<u64>(&dir, "split");

    for k in 1..=4 {
        tree.insert(k, k).unwrap();
        let stats = tree.check_invariants().unwrap();
        assert_eq!((stats.height, stats.leaf_nodes), (1, 1));
    }
    let single_leaf_root = tree.root();

    tree.insert(5, 5).unwrap();
    let stats = tree.check_invariants().unwrap();
    assert_eq!(stats.height, 2);
    assert_eq!(stats.leaf_nodes, 2);
    assert_eq!(stats.internal_nodes, 1);
    assert_ne!(tree.root(), single_leaf_root);
    // the leaf chain yields both leaves in order
    assert_eq!(
        tree.iter_all().unwrap().into_iter().map(|(k, _)| k).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
    tree.close().unwrap();
}

#[test]
fn merge_collapses_root_to_single_leaf() {
    let dir = TempDir::new().unwrap();
    let mut tree = unique_tree::<u64>(&dir, "merge");
    for k in 1..=5 {
        tree.insert(k, k).unwrap();
    }
    assert_eq!(tree.check_invariants().unwrap().height, 2);

    // right leaf [3, 4, 5] drains below two entries; the left leaf has none to lend
    tree.erase(&5).unwrap();
    tree.erase(&4).unwrap();

    let stats = tree.check_invariants().unwrap();
    assert_eq!(stats.height, 1);
    assert_eq!(stats.leaf_nodes, 1);
    assert_eq!(stats.internal_nodes, 0);
    assert_eq!(
        tree.iter_all().unwrap(),
        vec![(1, 1), (2, 2), (3, 3)]
    );
    tree.close().unwrap();
}

#[test]
fn borrow_from_sibling_keeps_two_leaves() {
    let dir = TempDir::new().unwrap();
    let mut tree = unique_tree::<u64>(&dir, "borrow");
    for k in 1..=5 {
        tree.insert(k, k).unwrap();
    }
    // left leaf [1, 2] underflows; right leaf [3, 4, 5] lends its first entry
    tree.erase(&1).unwrap();

    let stats = tree.check_invariants().unwrap();
    assert_eq!(stats.leaf_nodes, 2);
    assert_eq!(tree.find(&3).unwrap(), Some(3));
    assert_eq!(tree.range(&0, &10).unwrap().len(), 4);
    tree.close().unwrap();
}

#[test]
fn noop_operations_leave_tree_unchanged() {
    let dir = TempDir::new().unwrap();
    let mut tree = unique_tree::<u64>(&dir, "noop");
    for k in 0..30 {
        tree.insert(k, k).unwrap();
    }
    let before = tree.iter_all().unwrap();
    let stats_before = tree.check_invariants().unwrap();

    assert!(!tree.insert(10, 999).unwrap());
    assert_eq!(tree.erase(&100).unwrap(), None);

    assert_eq!(tree.iter_all().unwrap(), before);
    assert_eq!(tree.check_invariants().unwrap(), stats_before);
    assert_eq!(tree.len(), 30);
    tree.close().unwrap();
}

#[test]
fn erase_everything_then_reuse() {
    let dir = TempDir::new().unwrap();
    let mut tree = unique_tree::<u64>(&dir, "drain");
    for k in 0..100 {
        tree.insert(k, k).unwrap();
    }
    for k in (0..100).rev() {
        assert_eq!(tree.erase(&k).unwrap(), Some(k));
    }
    assert!(tree.is_empty());
    assert_eq!(tree.min_key().unwrap(), None);

    for k in 0..10 {
        tree.insert(k, k * 3).unwrap();
    }
    assert_eq!(tree.find(&9).unwrap(), Some(27));
    tree.check_invariants().unwrap();
    tree.close().unwrap();
}
