//! Table configuration
//!
//! Two layers: `StoreConfig` tunes the paged file and its page cache,
//! `TreeConfig` adds the node geometry of a B+ tree table on top of it.

use crate::{Result, StorageError};
use serde::{Deserialize, Serialize};

/// Default number of decoded nodes kept resident per table.
pub const DEFAULT_CACHE_CAPACITY: usize = 1200;

/// Default number of freed addresses buffered before a pool block is spilled.
pub const DEFAULT_POOL_BLOCK_CAPACITY: usize = 1000;

/// Byte budget a single node (entries + child addresses) is sized against.
pub const NODE_BYTE_BUDGET: usize = 4000;

/// Smallest supported node degree.
pub const MIN_DEGREE: usize = 4;

/// Paged file + page cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of cached entries before the least recently used one is evicted
    pub cache_capacity: usize,

    /// Addresses held in the in-memory free-slot buffer before it is written as a block
    pub pool_block_capacity: usize,

    /// fsync both files on close
    pub sync_on_close: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            pool_block_capacity: DEFAULT_POOL_BLOCK_CAPACITY,
            sync_on_close: false,
        }
    }
}

impl StoreConfig {
    /// Small cache and pool blocks so eviction and pool paging happen early.
    pub fn for_testing() -> Self {
        Self {
            cache_capacity: 8,
            pool_block_capacity: 4,
            sync_on_close: false,
        }
    }

    /// Same as default but fsyncs on close.
    pub fn for_durability() -> Self {
        Self {
            sync_on_close: true,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(StorageError::InvalidArgument(
                "cache_capacity must be at least 1".into(),
            ));
        }
        if self.pool_block_capacity == 0 {
            return Err(StorageError::InvalidArgument(
                "pool_block_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// B+ tree table configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TreeConfig {
    /// Maximum entries per node. `None` derives it from `NODE_BYTE_BUDGET`.
    pub degree: Option<usize>,

    /// Storage layer settings
    pub store: StoreConfig,
}

impl TreeConfig {
    /// Degree 4 over the testing store so splits and merges show up after a handful of keys.
    pub fn for_testing() -> Self {
        Self {
            degree: Some(MIN_DEGREE),
            store: StoreConfig::for_testing(),
        }
    }

    pub fn for_durability() -> Self {
        Self {
            degree: None,
            store: StoreConfig::for_durability(),
        }
    }

    pub fn with_degree(mut self, degree: usize) -> Self {
        self.degree = Some(degree);
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.store.cache_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        if let Some(degree) = self.degree {
            if degree < MIN_DEGREE || degree % 2 != 0 {
                return Err(StorageError::InvalidArgument(format!(
                    "degree must be an even number >= {}, got {}",
                    MIN_DEGREE, degree
                )));
            }
        }
        Ok(())
    }

    /// Resolve the node degree for an entry of `entry_len` bytes.
    ///
    /// Each entry costs its encoded size plus one 8-byte child address.
    pub fn resolve_degree(&self, entry_len: usize) -> usize {
        match self.degree {
            Some(degree) => degree,
            None => {
                let fit = NODE_BYTE_BUDGET / (8 + entry_len);
                (fit - fit % 2).max(MIN_DEGREE)
            }
        }
    }
}
