//! Multi-value B+ tree
//!
//! Same engine as [`BTree`](super::BTree), ordered by `(key, value)` so a key
//! can index many values. Lookups by key walk the leaf chain from the first
//! matching entry.

use crate::cache::CacheStats;
use crate::config::TreeConfig;
use crate::types::{Address, BTreeKey, BTreeValue};
use crate::Result;
use std::cmp::Ordering;
use std::path::Path;

use super::engine::{Engine, FileStats, PairOrder, TreeStats};

pub struct MultiBTree<K: BTreeKey, V: BTreeValue> {
    engine: Engine<K, V, PairOrder>,
}

impl<K: BTreeKey, V: BTreeValue> MultiBTree<K, V> {
    pub fn open(base: impl AsRef<Path>, config: TreeConfig) -> Result<Self> {
        Ok(Self {
            engine: Engine::open(base, &config)?,
        })
    }

    /// Index `value` under `key`. Returns false if the pair is already present.
    pub fn insert(&mut self, key: K, value: V) -> Result<bool> {
        self.engine.insert((key, value))
    }

    /// Remove one (key, value) pair. Returns false if it was absent.
    pub fn erase(&mut self, key: &K, value: &V) -> Result<bool> {
        Ok(self.engine.remove_by(pair_probe(key, value))?.is_some())
    }

    /// Every value stored under `key`, ascending.
    pub fn find(&mut self, key: &K) -> Result<Vec<V>> {
        let entries = self
            .engine
            .scan_from(|e| e.0.cmp(key), |e| e.0 == *key)?;
        Ok(entries.into_iter().map(|(_, v)| v).collect())
    }

    pub fn contains(&mut self, key: &K, value: &V) -> Result<bool> {
        Ok(self.engine.get_by(pair_probe(key, value))?.is_some())
    }

    pub fn contains_key(&mut self, key: &K) -> Result<bool> {
        Ok(self
            .engine
            .seek(|e| e.0.cmp(key))?
            .map_or(false, |(k, _)| k == *key))
    }

    /// All pairs with `lo <= key <= hi`, ordered by (key, value).
    pub fn range(&mut self, lo: &K, hi: &K) -> Result<Vec<(K, V)>> {
        if lo > hi {
            return Ok(Vec::new());
        }
        self.engine.scan_from(|e| e.0.cmp(lo), |e| e.0 <= *hi)
    }

    pub fn iter_all(&mut self) -> Result<Vec<(K, V)>> {
        self.engine.scan_from(|_| Ordering::Greater, |_| true)
    }

    pub fn min_key(&mut self) -> Result<Option<K>> {
        Ok(self.engine.first()?.map(|(k, _)| k))
    }

    pub fn max_key(&mut self) -> Result<Option<K>> {
        Ok(self.engine.last()?.map(|(k, _)| k))
    }

    /// Number of (key, value) pairs
    pub fn len(&self) -> usize {
        self.engine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engine.is_empty()
    }

    pub fn degree(&self) -> usize {
        self.engine.degree()
    }

    pub fn root(&self) -> Address {
        self.engine.root()
    }

    pub fn check_invariants(&mut self) -> Result<TreeStats> {
        self.engine.check_invariants()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.engine.cache_stats()
    }

    pub fn file_stats(&self) -> FileStats {
        self.engine.file_stats()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.engine.flush()
    }

    pub fn close(self) -> Result<()> {
        self.engine.close()
    }
}

fn pair_probe<'a, K: Ord, V: Ord>(key: &'a K, value: &'a V) -> impl Fn(&(K, V)) -> Ordering + 'a {
    move |e| e.0.cmp(key).then_with(|| e.1.cmp(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FixedStr;
    use tempfile::TempDir;

    type Name = FixedStr<16>;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn create_test_tree() -> (MultiBTree<Name, u32>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let tree = MultiBTree::open(temp_dir.path().join("multi"), TreeConfig::for_testing()).unwrap();
        (tree, temp_dir)
    }

    #[test]
    fn test_values_under_one_key() {
        let (mut tree, _dir) = create_test_tree();

        assert!(tree.insert(name("X"), 2).unwrap());
        assert!(tree.insert(name("X"), 1).unwrap());
        assert!(tree.insert(name("Y"), 1).unwrap());
        assert!(!tree.insert(name("X"), 1).unwrap());

        assert_eq!(tree.find(&name("X")).unwrap(), vec![1, 2]);
        assert_eq!(tree.find(&name("Y")).unwrap(), vec![1]);
        assert!(tree.find(&name("Z")).unwrap().is_empty());
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_erase_exact_pair() {
        let (mut tree, _dir) = create_test_tree();

        tree.insert(name("X"), 1).unwrap();
        tree.insert(name("X"), 2).unwrap();
        assert!(!tree.erase(&name("X"), &3).unwrap());
        assert!(tree.erase(&name("X"), &1).unwrap());
        assert!(!tree.erase(&name("X"), &1).unwrap());
        assert_eq!(tree.find(&name("X")).unwrap(), vec![2]);
        assert!(tree.contains(&name("X"), &2).unwrap());
        assert!(!tree.contains(&name("X"), &1).unwrap());
    }

    #[test]
    fn test_find_spans_leaves() {
        let (mut tree, _dir) = create_test_tree();

        // one key with far more values than a degree-4 leaf holds
        for v in (0..40).rev() {
            tree.insert(name("station"), v).unwrap();
        }
        tree.insert(name("alpha"), 7).unwrap();
        tree.insert(name("zulu"), 7).unwrap();

        let stats = tree.check_invariants().unwrap();
        assert!(stats.leaf_nodes > 5);
        assert_eq!(tree.find(&name("station")).unwrap(), (0..40).collect::<Vec<_>>());
        assert!(tree.contains_key(&name("alpha")).unwrap());
        assert!(!tree.contains_key(&name("beta")).unwrap());
    }

    #[test]
    fn test_range_by_key() {
        let (mut tree, _dir) = create_test_tree();

        for (k, v) in [("a", 1), ("b", 1), ("b", 2), ("c", 1), ("d", 1)] {
            tree.insert(name(k), v).unwrap();
        }
        let pairs = tree.range(&name("b"), &name("c")).unwrap();
        assert_eq!(pairs, vec![(name("b"), 1), (name("b"), 2), (name("c"), 1)]);
        assert_eq!(tree.min_key().unwrap(), Some(name("a")));
        assert_eq!(tree.max_key().unwrap(), Some(name("d")));
    }

    #[test]
    fn test_rebalance_with_duplicates() {
        let (mut tree, _dir) = create_test_tree();

        for k in 0..10u32 {
            for v in 0..10u32 {
                tree.insert(name(&format!("k{:02}", k)), v).unwrap();
            }
        }
        tree.check_invariants().unwrap();

        for k in 0..10u32 {
            for v in (0..10u32).filter(|v| v % 3 != 0) {
                assert!(tree.erase(&name(&format!("k{:02}", k)), &v).unwrap());
            }
            tree.check_invariants().unwrap();
        }
        assert_eq!(tree.len(), 40);
        assert_eq!(tree.find(&name("k05")).unwrap(), vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("multi_persist");
        {
            let mut tree = MultiBTree::<Name, u32>::open(&path, TreeConfig::for_testing()).unwrap();
            for v in 0..25 {
                tree.insert(name("G101"), v).unwrap();
            }
            tree.close().unwrap();
        }
        let mut tree = MultiBTree::<Name, u32>::open(&path, TreeConfig::for_testing()).unwrap();
        assert_eq!(tree.find(&name("G101")).unwrap().len(), 25);
        tree.check_invariants().unwrap();
    }
}
