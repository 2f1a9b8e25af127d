//! bptstore storage engine
//!
//! Ordered, persistent key-value indexes over flat files.
//!
//! ## Layers
//! - `storage`: fixed-size slot files with a persisted free-slot pool
//! - `cache`: write-back LRU of decoded slots
//! - `index`: unique-key and multi-value B+ trees on one shared engine
//!
//! ## Example
//! ```no_run
//! use bptstore::{BTree, MultiBTree, FixedStr, TreeConfig};
//!
//! # fn main() -> bptstore::Result<()> {
//! let mut trains = BTree::<u64, u64>::open("data/trains", TreeConfig::default())?;
//! trains.insert(1001, 42)?;
//! assert_eq!(trains.find(&1001)?, Some(42));
//! trains.close()?;
//!
//! let mut stops = MultiBTree::<FixedStr<32>, u64>::open("data/stops", TreeConfig::default())?;
//! stops.insert(FixedStr::new("Shanghai")?, 1001)?;
//! assert_eq!(stops.find(&FixedStr::new("Shanghai")?)?, vec![1001]);
//! stops.close()?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod index;
pub mod storage;
pub mod types;

mod error;

pub use config::{StoreConfig, TreeConfig};
pub use error::{Result, StorageError};
pub use index::{BTree, MultiBTree, SharedTree, TreeStats};
pub use types::{Address, BTreeKey, BTreeValue, FixedCodec, FixedStr};
