//! Cache module - write-back LRU cache over the paged file

pub mod page_cache;

pub use page_cache::{CacheStats, PageCache, SlotCodec};
