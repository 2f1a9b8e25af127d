//! B+ tree node and its slot encoding
//!
//! ## Slot layout (degree `D`)
//! ```text
//! [size u64][parent u64][entry 0 .. entry D-1][ptr 0 .. ptr D]
//! ```
//! Unused entries and pointers are zero. A node is a leaf iff `ptr 0` is zero;
//! a leaf keeps the address of the next leaf in `ptr 1`.

use crate::cache::SlotCodec;
use crate::types::{Address, BTreeKey, BTreeValue, FixedCodec};
use crate::{Result, StorageError};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

use super::bounded::BoundedVec;

/// Magic number for tree record files (ASCII "BPTS")
pub const TREE_MAGIC: u32 = 0x4250_5453;

/// Current tree format version
pub const TREE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TreeKind {
    /// At most one value per key
    #[default]
    Unique,
    /// Ordered by (key, value), many values per key
    Multi,
}

/// Tree metadata stored in the record file prelude
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TreeHeader {
    pub magic: u32,
    pub version: u32,
    pub kind: TreeKind,
    pub degree: u64,
    /// Root slot offset, 0 when the tree is empty
    pub root: u64,
    /// Number of entries
    pub len: u64,
}

/// One tree node, decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node<K, V> {
    pub parent: Address,
    pub entries: BoundedVec<(K, V)>,
    /// Empty for leaves
    pub children: BoundedVec<Address>,
    /// Next leaf in key order (leaves only)
    pub next: Address,
}

impl<K, V> Node<K, V> {
    /// Empty node. Arrays get one spare entry (and child) so an insert can
    /// overflow before the split.
    pub fn new(degree: usize, parent: Address) -> Self {
        Self {
            parent,
            entries: BoundedVec::with_capacity(degree + 1),
            children: BoundedVec::with_capacity(degree + 2),
            next: Address::NULL,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Fixed geometry of a node slot for one (K, V, degree) combination
pub struct NodeLayout<K, V> {
    degree: usize,
    entry_len: usize,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K: BTreeKey, V: BTreeValue> NodeLayout<K, V> {
    pub fn new(degree: usize) -> Self {
        Self {
            degree,
            entry_len: K::encoded_len() + V::encoded_len(),
            _marker: PhantomData,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    fn entries_offset(&self) -> usize {
        16
    }

    fn ptrs_offset(&self) -> usize {
        self.entries_offset() + self.degree * self.entry_len
    }
}

impl<K: BTreeKey, V: BTreeValue> SlotCodec for NodeLayout<K, V> {
    type Item = Node<K, V>;

    fn slot_size(&self) -> usize {
        self.ptrs_offset() + (self.degree + 1) * 8
    }

    fn encode(&self, node: &Node<K, V>, buf: &mut [u8]) -> Result<()> {
        if node.entries.len() > self.degree {
            return Err(StorageError::Index(format!(
                "node with {} entries exceeds degree {}",
                node.entries.len(),
                self.degree
            )));
        }
        buf.fill(0);
        (node.entries.len() as u64).encode_into(&mut buf[0..8]);
        node.parent.encode_into(&mut buf[8..16]);

        let key_len = K::encoded_len();
        let mut pos = self.entries_offset();
        for (key, value) in node.entries.iter() {
            key.encode_into(&mut buf[pos..pos + key_len]);
            value.encode_into(&mut buf[pos + key_len..pos + self.entry_len]);
            pos += self.entry_len;
        }

        let ptrs = self.ptrs_offset();
        if node.is_leaf() {
            node.next.encode_into(&mut buf[ptrs + 8..ptrs + 16]);
        } else {
            for (i, child) in node.children.iter().enumerate() {
                child.encode_into(&mut buf[ptrs + i * 8..ptrs + i * 8 + 8]);
            }
        }
        Ok(())
    }

    fn decode(&self, buf: &[u8]) -> Result<Node<K, V>> {
        let size = u64::decode_from(&buf[0..8])? as usize;
        if size > self.degree {
            return Err(StorageError::Corruption(format!(
                "node size {} exceeds degree {}",
                size, self.degree
            )));
        }
        let mut node = Node::new(self.degree, Address::decode_from(&buf[8..16])?);

        let key_len = K::encoded_len();
        let mut pos = self.entries_offset();
        for _ in 0..size {
            let key = K::decode_from(&buf[pos..pos + key_len])?;
            let value = V::decode_from(&buf[pos + key_len..pos + self.entry_len])?;
            node.entries.push((key, value))?;
            pos += self.entry_len;
        }

        let ptrs = self.ptrs_offset();
        let first = Address::decode_from(&buf[ptrs..ptrs + 8])?;
        if first.is_null() {
            node.next = Address::decode_from(&buf[ptrs + 8..ptrs + 16])?;
        } else {
            for i in 0..=size {
                let child = Address::decode_from(&buf[ptrs + i * 8..ptrs + i * 8 + 8])?;
                if child.is_null() {
                    return Err(StorageError::Corruption(format!(
                        "internal node with {} entries is missing child {}",
                        size, i
                    )));
                }
                node.children.push(child)?;
            }
        }
        Ok(node)
    }
}
