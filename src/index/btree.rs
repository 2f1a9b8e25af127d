//! Persistent unique-key B+ tree
//!
//! ## Design Principles
//! - **Disk-First**: one node per fixed-size slot, reached through a write-back LRU cache
//! - **Generic**: any fixed-width key and value (`FixedCodec`)
//! - **Unique**: at most one value per key; inserting a present key is a no-op
//!
//! ## Architecture
//! ```text
//! Memory:   [PageCache] <-LRU-> decoded nodes
//!              | evict / flush (dirty only)
//! Disk:     [table.db] prelude | slot | slot | ...     [table_pool.db] freed slots
//! ```

use crate::cache::CacheStats;
use crate::config::TreeConfig;
use crate::types::{Address, BTreeKey, BTreeValue};
use crate::Result;
use std::cmp::Ordering;
use std::path::Path;

use super::engine::{Engine, FileStats, KeyOrder, TreeStats};

/// Unique-key B+ tree over one table
pub struct BTree<K: BTreeKey, V: BTreeValue> {
    engine: Engine<K, V, KeyOrder>,
}

impl<K: BTreeKey, V: BTreeValue> BTree<K, V> {
    /// Open or create the table stored at `<base>.db` / `<base>_pool.db`.
    pub fn open(base: impl AsRef<Path>, config: TreeConfig) -> Result<Self> {
        Ok(Self {
            engine: Engine::open(base, &config)?,
        })
    }

    /// Insert a new key. Returns false (and changes nothing) if the key exists.
    pub fn insert(&mut self, key: K, value: V) -> Result<bool> {
        self.engine.insert((key, value))
    }

    pub fn find(&mut self, key: &K) -> Result<Option<V>> {
        Ok(self.engine.get_by(|e| e.0.cmp(key))?.map(|(_, v)| v))
    }

    pub fn contains(&mut self, key: &K) -> Result<bool> {
        Ok(self.find(key)?.is_some())
    }

    /// Remove a key, returning its value if it was present.
    pub fn erase(&mut self, key: &K) -> Result<Option<V>> {
        Ok(self.engine.remove_by(|e| e.0.cmp(key))?.map(|(_, v)| v))
    }

    /// All entries with `lo <= key <= hi`, ascending.
    pub fn range(&mut self, lo: &K, hi: &K) -> Result<Vec<(K, V)>> {
        if lo > hi {
            return Ok(Vec::new());
        }
        self.engine.scan_from(|e| e.0.cmp(lo), |e| e.0 <= *hi)
    }

    /// Every entry in key order, read along the leaf chain
    pub fn iter_all(&mut self) -> Result<Vec<(K, V)>> {
        self.engine.scan_from(|_| Ordering::Greater, |_| true)
    }

    pub fn min_key(&mut self) -> Result<Option<K>> {
        Ok(self.engine.first()?.map(|(k, _)| k))
    }

    pub fn max_key(&mut self) -> Result<Option<K>> {
        Ok(self.engine.last()?.map(|(k, _)| k))
    }

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

    /// Write dirty nodes and the header without closing.
    pub fn flush(&mut self) -> Result<()> {
        self.engine.flush()
    }

    pub fn close(self) -> Result<()> {
        self.engine.close()
    }
}
