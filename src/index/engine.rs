//! Shared B+ tree engine
//!
//! Both tree flavours run on this engine; they differ only in the
//! [`EntryOrder`] that ranks `(key, value)` entries.
//!
//! ## Structure
//! - Every node lives in one slot and is reached only through the page cache.
//! - A separator in an internal node is a lower bound of the child to its right:
//!   child `i` holds entries in `[entries[i-1], entries[i])`.
//! - Leaves form a forward chain in ascending order.
//!
//! Mutations copy a node out of the cache, edit the copy and write it back,
//! so no two cached nodes are ever borrowed at once.

use crate::cache::{CacheStats, PageCache};
use crate::config::TreeConfig;
use crate::types::{Address, BTreeKey, BTreeValue};
use crate::{Result, StorageError};
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::path::Path;
use tracing::{debug, trace};

use super::node::{Node, NodeLayout, TreeHeader, TreeKind, TREE_MAGIC, TREE_VERSION};

/// Total order over tree entries
pub trait EntryOrder<K, V> {
    const KIND: TreeKind;

    fn cmp(a: &(K, V), b: &(K, V)) -> Ordering;
}

/// Entries are ranked by key alone; one entry per key.
pub struct KeyOrder;

impl<K: Ord, V> EntryOrder<K, V> for KeyOrder {
    const KIND: TreeKind = TreeKind::Unique;

    fn cmp(a: &(K, V), b: &(K, V)) -> Ordering {
        a.0.cmp(&b.0)
    }
}

/// Entries are ranked by (key, value); many values per key.
pub struct PairOrder;

impl<K: Ord, V: Ord> EntryOrder<K, V> for PairOrder {
    const KIND: TreeKind = TreeKind::Multi;

    fn cmp(a: &(K, V), b: &(K, V)) -> Ordering {
        a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1))
    }
}

/// Shape of a tree as measured by [`Engine::check_invariants`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeStats {
    /// Levels from root to leaves, 0 for an empty tree
    pub height: usize,
    pub leaf_nodes: usize,
    pub internal_nodes: usize,
    pub entries: usize,
}

/// Record file usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    /// Logical end of the record file in bytes
    pub data_end: u64,
    pub slot_size: usize,
    /// Freed slots waiting for reuse
    pub free_slots: usize,
}

/// Child routing during descent
#[derive(Clone, Copy)]
enum Route {
    /// Child holding the probe itself (equal separators route right)
    Upper,
    /// Leftmost child that can hold an entry not less than the probe
    Lower,
}

type Cache<K, V> = PageCache<NodeLayout<K, V>, TreeHeader>;

pub struct Engine<K: BTreeKey, V: BTreeValue, O: EntryOrder<K, V>> {
    cache: Cache<K, V>,
    degree: usize,
    _order: PhantomData<O>,
}

impl<K: BTreeKey, V: BTreeValue, O: EntryOrder<K, V>> Engine<K, V, O> {
    pub fn open(base: impl AsRef<Path>, config: &TreeConfig) -> Result<Self> {
        config.validate()?;
        let degree = config.resolve_degree(K::encoded_len() + V::encoded_len());
        let base = base.as_ref();
        let mut cache = PageCache::open(base, NodeLayout::<K, V>::new(degree), &config.store)?;

        if cache.file().is_fresh() {
            *cache.header_mut() = TreeHeader {
                magic: TREE_MAGIC,
                version: TREE_VERSION,
                kind: O::KIND,
                degree: degree as u64,
                root: 0,
                len: 0,
            };
        } else {
            let header = cache.header();
            if header.magic != TREE_MAGIC {
                return Err(StorageError::Corruption(format!(
                    "invalid tree magic: expected 0x{:08X}, got 0x{:08X}",
                    TREE_MAGIC, header.magic
                )));
            }
            if header.version != TREE_VERSION {
                return Err(StorageError::Corruption(format!(
                    "unsupported tree version: {}",
                    header.version
                )));
            }
            if header.kind != O::KIND {
                return Err(StorageError::InvalidArgument(format!(
                    "table was created as a {:?} tree, opened as {:?}",
                    header.kind,
                    O::KIND
                )));
            }
            if header.degree != degree as u64 {
                return Err(StorageError::InvalidArgument(format!(
                    "table was created with degree {}, opened with {}",
                    header.degree, degree
                )));
            }
        }

        debug!(
            target: "bptstore::index",
            path = %base.display(),
            kind = ?O::KIND,
            degree,
            root = cache.header().root,
            len = cache.header().len,
            "opened tree"
        );

        Ok(Self {
            cache,
            degree,
            _order: PhantomData,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn root(&self) -> Address {
        Address::new(self.cache.header().root)
    }

    pub fn len(&self) -> usize {
        self.cache.header().len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.root().is_null()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn file_stats(&self) -> FileStats {
        let file = self.cache.file();
        FileStats {
            data_end: file.data_end(),
            slot_size: file.slot_size(),
            free_slots: file.free_slots(),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.cache.flush()
    }

    pub fn close(self) -> Result<()> {
        debug!(
            target: "bptstore::index",
            root = self.cache.header().root,
            len = self.cache.header().len,
            "closing tree"
        );
        self.cache.close()
    }

    fn min_entries(&self) -> usize {
        self.degree / 2
    }

    fn set_root(&mut self, root: Address) {
        self.cache.header_mut().root = root.offset();
    }

    fn adjust_len(&mut self, delta: i64) {
        let header = self.cache.header_mut();
        header.len = header.len.saturating_add_signed(delta);
    }

    fn node(&mut self, addr: Address) -> Result<Node<K, V>> {
        Ok(self.cache.read_only(addr)?.clone())
    }

    fn set_parent(&mut self, addr: Address, parent: Address) -> Result<()> {
        self.cache.read_write(addr)?.parent = parent;
        Ok(())
    }

    /// Walk from the root to a leaf. `probe(e)` orders entry `e` against the target.
    fn descend<F>(&mut self, probe: &F, route: Route) -> Result<Option<Address>>
    where
        F: Fn(&(K, V)) -> Ordering,
    {
        let mut addr = self.root();
        if addr.is_null() {
            return Ok(None);
        }
        loop {
            let node = self.cache.read_only(addr)?;
            if node.is_leaf() {
                return Ok(Some(addr));
            }
            let idx = match route {
                Route::Upper => node.entries.partition_point(|e| probe(e) != Ordering::Greater),
                Route::Lower => node.entries.partition_point(|e| probe(e) == Ordering::Less),
            };
            addr = node.children[idx];
        }
    }

    /// Exact lookup
    pub fn get_by<F>(&mut self, probe: F) -> Result<Option<(K, V)>>
    where
        F: Fn(&(K, V)) -> Ordering,
    {
        let Some(leaf) = self.descend(&probe, Route::Upper)? else {
            return Ok(None);
        };
        let node = self.cache.read_only(leaf)?;
        Ok(node
            .entries
            .binary_search_by(|e| probe(e))
            .ok()
            .map(|pos| node.entries[pos].clone()))
    }

    /// Collect entries in order, starting at the first one not less than the
    /// probe and stopping at the first one `keep` rejects.
    pub fn scan_from<F, P>(&mut self, probe: F, mut keep: P) -> Result<Vec<(K, V)>>
    where
        F: Fn(&(K, V)) -> Ordering,
        P: FnMut(&(K, V)) -> bool,
    {
        let mut out = Vec::new();
        let Some(mut addr) = self.descend(&probe, Route::Lower)? else {
            return Ok(out);
        };
        let mut start = {
            let node = self.cache.read_only(addr)?;
            node.entries.partition_point(|e| probe(e) == Ordering::Less)
        };
        while !addr.is_null() {
            let node = self.cache.read_only(addr)?;
            for entry in &node.entries[start..] {
                if !keep(entry) {
                    return Ok(out);
                }
                out.push(entry.clone());
            }
            addr = node.next;
            start = 0;
        }
        Ok(out)
    }

    /// First entry not less than the probe
    pub fn seek<F>(&mut self, probe: F) -> Result<Option<(K, V)>>
    where
        F: Fn(&(K, V)) -> Ordering,
    {
        let Some(leaf) = self.descend(&probe, Route::Lower)? else {
            return Ok(None);
        };
        let node = self.cache.read_only(leaf)?;
        let pos = node.entries.partition_point(|e| probe(e) == Ordering::Less);
        if let Some(entry) = node.entries.get(pos) {
            return Ok(Some(entry.clone()));
        }
        let next = node.next;
        if next.is_null() {
            return Ok(None);
        }
        Ok(self.cache.read_only(next)?.entries.first().cloned())
    }

    pub fn first(&mut self) -> Result<Option<(K, V)>> {
        let Some(leaf) = self.descend(&|_: &(K, V)| Ordering::Greater, Route::Lower)? else {
            return Ok(None);
        };
        Ok(self.cache.read_only(leaf)?.entries.first().cloned())
    }

    pub fn last(&mut self) -> Result<Option<(K, V)>> {
        let Some(leaf) = self.descend(&|_: &(K, V)| Ordering::Less, Route::Upper)? else {
            return Ok(None);
        };
        Ok(self.cache.read_only(leaf)?.entries.last().cloned())
    }

    /// Insert `entry` unless an equal entry exists. Returns whether it was inserted.
    pub fn insert(&mut self, entry: (K, V)) -> Result<bool> {
        let probe = |e: &(K, V)| O::cmp(e, &entry);
        let Some(leaf_addr) = self.descend(&probe, Route::Upper)? else {
            let addr = self.cache.new_space()?;
            let mut leaf = Node::new(self.degree, Address::NULL);
            leaf.entries.push(entry)?;
            self.cache.write(addr, leaf)?;
            self.set_root(addr);
            self.adjust_len(1);
            trace!(target: "bptstore::index", root = %addr, "created root leaf");
            return Ok(true);
        };

        let mut leaf = self.node(leaf_addr)?;
        let pos = match leaf.entries.binary_search_by(|e| probe(e)) {
            Ok(_) => return Ok(false),
            Err(pos) => pos,
        };
        leaf.entries.insert(pos, entry)?;
        self.adjust_len(1);

        if leaf.entries.len() <= self.degree {
            self.cache.write(leaf_addr, leaf)?;
            return Ok(true);
        }
        self.split_leaf(leaf_addr, leaf)?;
        Ok(true)
    }

    fn split_leaf(&mut self, addr: Address, mut leaf: Node<K, V>) -> Result<()> {
        let right_addr = self.cache.new_space()?;
        let mut right = Node::new(self.degree, leaf.parent);
        right.entries = leaf.entries.split_off(self.degree / 2);
        right.next = leaf.next;
        leaf.next = right_addr;
        let separator = right.entries[0].clone();

        trace!(
            target: "bptstore::index",
            left = %addr,
            right = %right_addr,
            left_len = leaf.entries.len(),
            right_len = right.entries.len(),
            "split leaf"
        );
        self.cache.write(addr, leaf)?;
        self.cache.write(right_addr, right)?;
        self.insert_into_parent(addr, separator, right_addr)
    }

    /// Hook `right` in after `left` under their shared parent, splitting
    /// ancestors as needed.
    fn insert_into_parent(
        &mut self,
        mut left: Address,
        mut separator: (K, V),
        mut right: Address,
    ) -> Result<()> {
        loop {
            let parent_addr = self.cache.read_only(left)?.parent;
            if parent_addr.is_null() {
                let root_addr = self.cache.new_space()?;
                let mut root = Node::new(self.degree, Address::NULL);
                root.entries.push(separator)?;
                root.children.push(left)?;
                root.children.push(right)?;
                self.cache.write(root_addr, root)?;
                self.set_parent(left, root_addr)?;
                self.set_parent(right, root_addr)?;
                self.set_root(root_addr);
                trace!(target: "bptstore::index", root = %root_addr, "grew new root");
                return Ok(());
            }

            let mut parent = self.node(parent_addr)?;
            let idx = child_position(&parent, left)?;
            parent.entries.insert(idx, separator)?;
            parent.children.insert(idx + 1, right)?;
            if parent.entries.len() <= self.degree {
                self.cache.write(parent_addr, parent)?;
                return Ok(());
            }

            // split the internal node; the middle entry moves up
            let mid = self.degree / 2;
            let sibling_addr = self.cache.new_space()?;
            let mut sibling = Node::new(self.degree, parent.parent);
            sibling.entries = parent.entries.split_off(mid);
            let promoted = sibling.entries.remove(0);
            sibling.children = parent.children.split_off(mid + 1);
            let moved: Vec<Address> = sibling.children.to_vec();

            trace!(
                target: "bptstore::index",
                left = %parent_addr,
                right = %sibling_addr,
                "split internal node"
            );
            self.cache.write(parent_addr, parent)?;
            self.cache.write(sibling_addr, sibling)?;
            for child in moved {
                self.set_parent(child, sibling_addr)?;
            }

            left = parent_addr;
            separator = promoted;
            right = sibling_addr;
        }
    }

    /// Remove the entry the probe matches exactly.
    pub fn remove_by<F>(&mut self, probe: F) -> Result<Option<(K, V)>>
    where
        F: Fn(&(K, V)) -> Ordering,
    {
        let Some(leaf_addr) = self.descend(&probe, Route::Upper)? else {
            return Ok(None);
        };
        let mut leaf = self.node(leaf_addr)?;
        let Ok(pos) = leaf.entries.binary_search_by(|e| probe(e)) else {
            return Ok(None);
        };
        let removed = leaf.entries.remove(pos);
        self.adjust_len(-1);
        self.cache.write(leaf_addr, leaf)?;
        self.rebalance(leaf_addr)?;
        Ok(Some(removed))
    }

    /// Restore occupancy from `addr` upward after a removal.
    fn rebalance(&mut self, mut addr: Address) -> Result<()> {
        loop {
            let node = self.node(addr)?;
            if node.parent.is_null() {
                return self.shrink_root(addr, &node);
            }
            if node.entries.len() >= self.min_entries() {
                return Ok(());
            }

            let parent_addr = node.parent;
            let parent = self.node(parent_addr)?;
            let idx = child_position(&parent, addr)?;
            let right = parent.children.get(idx + 1).copied();
            let left = if idx > 0 { Some(parent.children[idx - 1]) } else { None };

            if let Some(right_addr) = right {
                let sibling = self.node(right_addr)?;
                if sibling.entries.len() > self.min_entries() {
                    return self.borrow_from_right(addr, node, right_addr, sibling, parent_addr, parent, idx);
                }
            }
            if let Some(left_addr) = left {
                let sibling = self.node(left_addr)?;
                if sibling.entries.len() > self.min_entries() {
                    return self.borrow_from_left(addr, node, left_addr, sibling, parent_addr, parent, idx);
                }
            }

            match (right, left) {
                (Some(right_addr), _) => {
                    let sibling = self.node(right_addr)?;
                    self.merge(addr, node, right_addr, sibling, parent_addr, parent, idx)?;
                }
                (None, Some(left_addr)) => {
                    let sibling = self.node(left_addr)?;
                    self.merge(left_addr, sibling, addr, node, parent_addr, parent, idx - 1)?;
                }
                (None, None) => {
                    return Err(StorageError::Corruption(format!(
                        "node {} has no siblings under parent {}",
                        addr, parent_addr
                    )));
                }
            }
            addr = parent_addr;
        }
    }

    fn shrink_root(&mut self, addr: Address, root: &Node<K, V>) -> Result<()> {
        if !root.entries.is_empty() {
            return Ok(());
        }
        if root.is_leaf() {
            self.cache.delete_space(addr)?;
            self.set_root(Address::NULL);
            trace!(target: "bptstore::index", "tree emptied");
        } else {
            let child = root.children[0];
            self.set_parent(child, Address::NULL)?;
            self.cache.delete_space(addr)?;
            self.set_root(child);
            trace!(target: "bptstore::index", root = %child, "collapsed root");
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn borrow_from_right(
        &mut self,
        addr: Address,
        mut node: Node<K, V>,
        right_addr: Address,
        mut right: Node<K, V>,
        parent_addr: Address,
        mut parent: Node<K, V>,
        idx: usize,
    ) -> Result<()> {
        let mut moved_child = None;
        if node.is_leaf() {
            node.entries.push(right.entries.remove(0))?;
            parent.entries[idx] = right.entries[0].clone();
        } else {
            // the separator comes down from the parent; the sibling's first entry goes up
            node.entries.push(parent.entries[idx].clone())?;
            let child = right.children.remove(0);
            node.children.push(child)?;
            parent.entries[idx] = right.entries.remove(0);
            moved_child = Some(child);
        }
        trace!(target: "bptstore::index", node = %addr, from = %right_addr, "borrowed from right");
        self.cache.write(addr, node)?;
        self.cache.write(right_addr, right)?;
        self.cache.write(parent_addr, parent)?;
        if let Some(child) = moved_child {
            self.set_parent(child, addr)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn borrow_from_left(
        &mut self,
        addr: Address,
        mut node: Node<K, V>,
        left_addr: Address,
        mut left: Node<K, V>,
        parent_addr: Address,
        mut parent: Node<K, V>,
        idx: usize,
    ) -> Result<()> {
        let mut moved_child = None;
        if node.is_leaf() {
            let entry = left.entries.pop().ok_or_else(|| underflow(left_addr))?;
            node.entries.insert(0, entry)?;
            parent.entries[idx - 1] = node.entries[0].clone();
        } else {
            node.entries.insert(0, parent.entries[idx - 1].clone())?;
            let child = left.children.pop().ok_or_else(|| underflow(left_addr))?;
            node.children.insert(0, child)?;
            parent.entries[idx - 1] = left.entries.pop().ok_or_else(|| underflow(left_addr))?;
            moved_child = Some(child);
        }
        trace!(target: "bptstore::index", node = %addr, from = %left_addr, "borrowed from left");
        self.cache.write(addr, node)?;
        self.cache.write(left_addr, left)?;
        self.cache.write(parent_addr, parent)?;
        if let Some(child) = moved_child {
            self.set_parent(child, addr)?;
        }
        Ok(())
    }

    /// Fold `right` into `left`, where `right` is `parent.children[sep + 1]`,
    /// then drop separator `sep` and free the right slot.
    #[allow(clippy::too_many_arguments)]
    fn merge(
        &mut self,
        left_addr: Address,
        mut left: Node<K, V>,
        right_addr: Address,
        mut right: Node<K, V>,
        parent_addr: Address,
        mut parent: Node<K, V>,
        sep: usize,
    ) -> Result<()> {
        let separator = parent.entries.remove(sep);
        parent.children.remove(sep + 1);

        let moved: Vec<Address> = right.children.to_vec();
        if left.is_leaf() {
            left.entries.append(&mut right.entries)?;
            left.next = right.next;
        } else {
            left.entries.push(separator)?;
            left.entries.append(&mut right.entries)?;
            left.children.append(&mut right.children)?;
        }

        trace!(
            target: "bptstore::index",
            into = %left_addr,
            freed = %right_addr,
            len = left.entries.len(),
            "merged nodes"
        );
        self.cache.write(left_addr, left)?;
        self.cache.write(parent_addr, parent)?;
        self.cache.delete_space(right_addr)?;
        for child in moved {
            self.set_parent(child, left_addr)?;
        }
        Ok(())
    }

    /// Walk the whole tree and verify every structural invariant.
    pub fn check_invariants(&mut self) -> Result<TreeStats> {
        let root = self.root();
        let mut stats = TreeStats::default();
        if root.is_null() {
            if self.len() != 0 {
                return Err(corruption(format!("empty tree records {} entries", self.len())));
            }
            return Ok(stats);
        }

        let mut leaves = Vec::new();
        let mut leaf_depth = None;
        // (node, expected parent, lower bound, upper bound, depth)
        let mut stack: Vec<(Address, Address, Option<(K, V)>, Option<(K, V)>, usize)> =
            vec![(root, Address::NULL, None, None, 1)];

        while let Some((addr, expected_parent, lo, hi, depth)) = stack.pop() {
            let node = self.node(addr)?;
            if node.parent != expected_parent {
                return Err(corruption(format!(
                    "node {} has parent {}, expected {}",
                    addr, node.parent, expected_parent
                )));
            }

            let len = node.entries.len();
            let is_root = addr == root;
            if len > self.degree || (!is_root && len < self.min_entries()) || (is_root && len == 0) {
                return Err(corruption(format!(
                    "node {} holds {} entries (degree {})",
                    addr, len, self.degree
                )));
            }
            for pair in node.entries.windows(2) {
                if O::cmp(&pair[0], &pair[1]) != Ordering::Less {
                    return Err(corruption(format!("node {} entries out of order", addr)));
                }
            }
            for entry in node.entries.iter() {
                let above_lo = lo.as_ref().map_or(true, |b| O::cmp(entry, b) != Ordering::Less);
                let below_hi = hi.as_ref().map_or(true, |b| O::cmp(entry, b) == Ordering::Less);
                if !above_lo || !below_hi {
                    return Err(corruption(format!(
                        "node {} entry {:?} outside its separator bounds",
                        addr, entry
                    )));
                }
            }

            if node.is_leaf() {
                match leaf_depth {
                    None => leaf_depth = Some(depth),
                    Some(d) if d != depth => {
                        return Err(corruption(format!(
                            "leaf {} at depth {}, other leaves at {}",
                            addr, depth, d
                        )));
                    }
                    Some(_) => {}
                }
                stats.leaf_nodes += 1;
                stats.entries += len;
                leaves.push((addr, node.next));
                continue;
            }

            if node.children.len() != len + 1 {
                return Err(corruption(format!(
                    "internal node {} has {} entries and {} children",
                    addr,
                    len,
                    node.children.len()
                )));
            }
            stats.internal_nodes += 1;
            // push right to left so leaves are visited in key order
            for i in (0..node.children.len()).rev() {
                let child_lo = if i == 0 { lo.clone() } else { Some(node.entries[i - 1].clone()) };
                let child_hi = if i == len { hi.clone() } else { Some(node.entries[i].clone()) };
                stack.push((node.children[i], addr, child_lo, child_hi, depth + 1));
            }
        }

        for (i, (addr, next)) in leaves.iter().enumerate() {
            let expected = leaves.get(i + 1).map_or(Address::NULL, |(a, _)| *a);
            if *next != expected {
                return Err(corruption(format!(
                    "leaf {} links to {}, expected {}",
                    addr, next, expected
                )));
            }
        }
        if stats.entries != self.len() {
            return Err(corruption(format!(
                "tree holds {} entries, header records {}",
                stats.entries,
                self.len()
            )));
        }
        stats.height = leaf_depth.unwrap_or(0);
        Ok(stats)
    }
}

fn child_position<K, V>(parent: &Node<K, V>, child: Address) -> Result<usize> {
    parent
        .children
        .iter()
        .position(|c| *c == child)
        .ok_or_else(|| corruption(format!("node {} missing from its parent's children", child)))
}

fn underflow(addr: Address) -> StorageError {
    StorageError::Index(format!("sibling {} ran out of entries while lending", addr))
}

fn corruption(msg: String) -> StorageError {
    StorageError::Corruption(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    type UniqueEngine = Engine<u64, u64, KeyOrder>;

    fn open(dir: &TempDir) -> UniqueEngine {
        Engine::open(dir.path().join("engine"), &TreeConfig::for_testing()).unwrap()
    }

    fn keys(engine: &mut UniqueEngine) -> Vec<u64> {
        engine
            .scan_from(|_| Ordering::Greater, |_| true)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect()
    }

    #[test]
    fn test_split_creates_root() {
        let dir = TempDir::new().unwrap();
        let mut engine = open(&dir);
        for k in 1..=4 {
            assert!(engine.insert((k, k * 10)).unwrap());
        }
        assert_eq!(engine.check_invariants().unwrap().height, 1);

        engine.insert((5, 50)).unwrap();
        let stats = engine.check_invariants().unwrap();
        assert_eq!(stats.height, 2);
        assert_eq!(stats.leaf_nodes, 2);
        assert_eq!(stats.internal_nodes, 1);

        let root = engine.root();
        let root_node = engine.node(root).unwrap();
        assert_eq!(root_node.entries.len(), 1);
        assert_eq!(root_node.entries[0].0, 3);
        engine.close().unwrap();
    }

    #[test]
    fn test_internal_split_reparents_children() {
        let dir = TempDir::new().unwrap();
        let mut engine = open(&dir);
        for k in 0..200 {
            engine.insert((k, k)).unwrap();
        }
        let stats = engine.check_invariants().unwrap();
        assert!(stats.height >= 3);
        assert_eq!(stats.entries, 200);
        assert_eq!(keys(&mut engine), (0..200).collect::<Vec<_>>());
        engine.close().unwrap();
    }

    #[test]
    fn test_borrow_and_merge_keep_invariants() {
        let dir = TempDir::new().unwrap();
        let mut engine = open(&dir);
        for k in 0..120 {
            engine.insert((k, k)).unwrap();
        }
        // remove from both ends and the middle to exercise each rebalance path
        let order: Vec<u64> = (0..40).chain((80..120).rev()).chain((40..80).step_by(2)).collect();
        for k in order {
            assert!(engine.remove_by(|e| e.0.cmp(&k)).unwrap().is_some());
            engine.check_invariants().unwrap();
        }
        let expected: Vec<u64> = (40..80).filter(|k| k % 2 == 1).collect();
        assert_eq!(keys(&mut engine), expected);
        engine.close().unwrap();
    }

    #[test]
    fn test_remove_all_empties_tree() {
        let dir = TempDir::new().unwrap();
        let mut engine = open(&dir);
        for k in 0..50 {
            engine.insert((k, k)).unwrap();
        }
        for k in 0..50 {
            engine.remove_by(|e| e.0.cmp(&k)).unwrap();
        }
        assert!(engine.is_empty());
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.check_invariants().unwrap(), TreeStats::default());
        // every slot went back to the pool or was trimmed off the tail
        let file = engine.file_stats();
        let slots = (file.data_end - crate::storage::PRELUDE_SIZE) as usize / file.slot_size;
        assert_eq!(slots, file.free_slots);
        engine.close().unwrap();
    }

    #[test]
    fn test_first_and_last() {
        let dir = TempDir::new().unwrap();
        let mut engine = open(&dir);
        assert_eq!(engine.first().unwrap(), None);
        for k in [50, 10, 90, 30, 70, 20, 80] {
            engine.insert((k, 0)).unwrap();
        }
        assert_eq!(engine.first().unwrap(), Some((10, 0)));
        assert_eq!(engine.last().unwrap(), Some((90, 0)));
        engine.close().unwrap();
    }

    #[test]
    fn test_reopen_with_other_kind_rejected() {
        let dir = TempDir::new().unwrap();
        open(&dir).close().unwrap();
        let result: Result<Engine<u64, u64, PairOrder>> =
            Engine::open(dir.path().join("engine"), &TreeConfig::for_testing());
        assert!(matches!(result, Err(StorageError::InvalidArgument(_))));
    }

    #[test]
    fn test_reopen_with_other_degree_rejected() {
        let dir = TempDir::new().unwrap();
        open(&dir).close().unwrap();
        let config = TreeConfig::for_testing().with_degree(6);
        let result: Result<UniqueEngine> = Engine::open(dir.path().join("engine"), &config);
        assert!(matches!(result, Err(StorageError::InvalidArgument(_))));
    }

    #[test]
    fn test_check_detects_bad_parent() {
        let dir = TempDir::new().unwrap();
        let mut engine = open(&dir);
        for k in 0..10 {
            engine.insert((k, k)).unwrap();
        }
        let root = engine.root();
        let child = engine.node(root).unwrap().children[0];
        engine.set_parent(child, Address::NULL).unwrap();
        assert!(matches!(
            engine.check_invariants(),
            Err(StorageError::Corruption(_))
        ));
    }
}
