//! Index layer
//!
//! Disk-resident B+ trees: a unique-key tree and a multi-value tree sharing one engine

mod bounded;
mod engine;
mod node;

pub mod btree;
pub mod multi_btree;
pub mod shared;

pub use bounded::BoundedVec;
pub use btree::BTree;
pub use engine::{EntryOrder, FileStats, KeyOrder, PairOrder, TreeStats};
pub use multi_btree::MultiBTree;
pub use node::{Node, NodeLayout, TreeHeader, TreeKind};
pub use shared::SharedTree;
