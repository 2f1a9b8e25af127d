//! Write-back page cache
//!
//! Decoded slots keyed by address, ordered by recency of access. Mutations stay
//! in memory until the entry is evicted, flushed or the cache is closed.
//!
//! Entries are handed out as borrows of the cache itself, so a caller can never
//! hold one across another access that might evict it.

use crate::config::StoreConfig;
use crate::storage::{PagedFile, TableHeader};
use crate::types::Address;
use crate::{Result, StorageError};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::Path;
use tracing::trace;

/// Maps a cached item to and from one fixed-size slot
pub trait SlotCodec {
    type Item;

    fn slot_size(&self) -> usize;

    fn encode(&self, item: &Self::Item, buf: &mut [u8]) -> Result<()>;

    fn decode(&self, buf: &[u8]) -> Result<Self::Item>;
}

struct CacheEntry<T> {
    value: T,
    dirty: bool,
}

/// Cache statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Dirty entries written to the backend (eviction or flush)
    pub write_backs: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache of decoded slots over a [`PagedFile`]
pub struct PageCache<C: SlotCodec, H: TableHeader> {
    file: PagedFile<H>,
    codec: C,
    entries: LruCache<Address, CacheEntry<C::Item>, ahash::RandomState>,
    scratch: Vec<u8>,
    stats: CacheStats,
    closed: bool,
}

impl<C: SlotCodec, H: TableHeader> PageCache<C, H> {
    /// Open the table files at `base` with slots sized by `codec`.
    pub fn open(base: impl AsRef<Path>, codec: C, config: &StoreConfig) -> Result<Self> {
        let capacity = NonZeroUsize::new(config.cache_capacity).ok_or_else(|| {
            StorageError::InvalidArgument("cache_capacity must be at least 1".into())
        })?;
        let file = PagedFile::open(base, codec.slot_size(), config)?;
        Ok(Self {
            scratch: vec![0u8; codec.slot_size()],
            file,
            codec,
            entries: LruCache::with_hasher(capacity, ahash::RandomState::new()),
            stats: CacheStats {
                capacity: capacity.get(),
                ..Default::default()
            },
            closed: false,
        })
    }

    /// Borrow the entry at `addr`, loading it on a miss.
    pub fn read_only(&mut self, addr: Address) -> Result<&C::Item> {
        Ok(&self.load(addr)?.value)
    }

    /// Borrow the entry at `addr` for mutation and mark it dirty.
    pub fn read_write(&mut self, addr: Address) -> Result<&mut C::Item> {
        let entry = self.load(addr)?;
        entry.dirty = true;
        Ok(&mut entry.value)
    }

    /// Insert or replace the entry at `addr` without reading the slot first.
    pub fn write(&mut self, addr: Address, value: C::Item) -> Result<()> {
        self.insert(addr, CacheEntry { value, dirty: true })
    }

    pub fn new_space(&mut self) -> Result<Address> {
        self.file.new_space()
    }

    /// Release a slot, dropping its cached copy without writing it back.
    pub fn delete_space(&mut self, addr: Address) -> Result<()> {
        self.entries.pop(&addr);
        self.file.delete_space(addr)
    }

    /// Write back every dirty entry and checkpoint the backend. Nothing is evicted.
    pub fn flush(&mut self) -> Result<()> {
        self.write_back_all()?;
        self.file.checkpoint()
    }

    /// Flush and close the backend.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.write_back_all()?;
        self.file.shutdown()
    }

    pub fn header(&self) -> &H {
        self.file.header()
    }

    pub fn header_mut(&mut self) -> &mut H {
        self.file.header_mut()
    }

    pub fn file(&self) -> &PagedFile<H> {
        &self.file
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.entries.contains(&addr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            ..self.stats.clone()
        }
    }

    fn load(&mut self, addr: Address) -> Result<&mut CacheEntry<C::Item>> {
        if self.entries.contains(&addr) {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
            self.file.read_slot(addr, &mut self.scratch)?;
            let value = self.codec.decode(&self.scratch)?;
            self.insert(addr, CacheEntry { value, dirty: false })?;
        }
        self.entries
            .get_mut(&addr)
            .ok_or_else(|| StorageError::Index(format!("cache lost entry {}", addr)))
    }

    fn insert(&mut self, addr: Address, entry: CacheEntry<C::Item>) -> Result<()> {
        let Some((evicted, old)) = self.entries.push(addr, entry) else {
            return Ok(());
        };
        // push hands back the replaced value when the key was already present
        if evicted == addr {
            return Ok(());
        }
        self.stats.evictions += 1;
        if old.dirty {
            self.codec.encode(&old.value, &mut self.scratch)?;
            self.file.write_slot(evicted, &self.scratch)?;
            self.stats.write_backs += 1;
            trace!(target: "bptstore::cache", addr = %evicted, "wrote back evicted entry");
        }
        Ok(())
    }

    fn write_back_all(&mut self) -> Result<()> {
        let mut written = 0u64;
        for (addr, entry) in self.entries.iter_mut() {
            if !entry.dirty {
                continue;
            }
            self.codec.encode(&entry.value, &mut self.scratch)?;
            self.file.write_slot(*addr, &self.scratch)?;
            entry.dirty = false;
            written += 1;
        }
        self.stats.write_backs += written;
        if written > 0 {
            trace!(target: "bptstore::cache", written, "flushed dirty entries");
        }
        Ok(())
    }
}

impl<C: SlotCodec, H: TableHeader> Drop for PageCache<C, H> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // the backend checkpoints itself when it drops right after this
        if let Err(e) = self.write_back_all() {
            tracing::warn!(
                target: "bptstore::cache",
                path = %self.file.path().display(),
                error = %e,
                "failed to write back dirty entries on drop"
            );
        }
    }
}
