//! Paged file backend
//!
//! A table lives in two files:
//!
//! ```text
//! <base>.db        [data_cursor u64][slot_size u64][header 48B] [slot][slot][slot]...
//!                  |<------------------ 64B prelude --------->| ^ first slot at 64
//!
//! <base>_pool.db   [pool_cursor u64][block_cap u64] [block][block]... [partial buffer]
//!                  block = [count u64][block_cap x u64]
//! ```
//!
//! `data_cursor` is the logical end of the record file. Freed addresses are kept
//! in an in-memory buffer that spills to the pool file as a full block and is
//! refilled from the newest block when it runs dry.

use crate::config::StoreConfig;
use crate::types::Address;
use crate::{Result, StorageError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Size of the record file prelude; the first slot starts here.
pub const PRELUDE_SIZE: u64 = 64;

/// Bytes reserved in the prelude for the bincode-encoded table header.
pub const HEADER_PAYLOAD_SIZE: usize = 48;

/// Pool file header: `[pool_cursor][block_cap]`.
const POOL_START: u64 = 16;

/// Table metadata persisted in the record file prelude
pub trait TableHeader: Serialize + DeserializeOwned + Default {}

impl<T: Serialize + DeserializeOwned + Default> TableHeader for T {}

/// Record file + free-slot pool for fixed-size slots
pub struct PagedFile<H: TableHeader> {
    data_path: PathBuf,
    data: File,
    pool: File,
    slot_size: u64,
    data_cursor: u64,
    pool_cursor: u64,
    block_capacity: usize,
    free: Vec<Address>,
    header: H,
    fresh: bool,
    sync_on_close: bool,
    closed: bool,
}

/// `<base>.db` and `<base>_pool.db`
pub fn table_paths(base: &Path) -> (PathBuf, PathBuf) {
    let mut data = base.as_os_str().to_owned();
    data.push(".db");
    let mut pool = base.as_os_str().to_owned();
    pool.push("_pool.db");
    (PathBuf::from(data), PathBuf::from(pool))
}

fn read_u64(file: &mut File) -> Result<u64> {
    let mut buf = [0u8; 8];
    file.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

impl<H: TableHeader> PagedFile<H> {
    /// Open (or create) the record and pool files of the table at `base`.
    pub fn open(base: impl AsRef<Path>, slot_size: usize, config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        if slot_size == 0 {
            return Err(StorageError::InvalidArgument("slot size must be non-zero".into()));
        }
        let base = base.as_ref();
        if let Some(parent) = base.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let (data_path, pool_path) = table_paths(base);

        let mut data = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&data_path)?;
        let mut pool = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&pool_path)?;

        let slot_size = slot_size as u64;
        let data_len = data.metadata()?.len();
        let fresh = data_len == 0;

        let (data_cursor, header) = if fresh {
            (PRELUDE_SIZE, H::default())
        } else {
            if data_len < PRELUDE_SIZE {
                return Err(StorageError::Corruption(format!(
                    "record file {} is shorter than its prelude ({} bytes)",
                    data_path.display(),
                    data_len
                )));
            }
            data.seek(SeekFrom::Start(0))?;
            let cursor = read_u64(&mut data)?;
            let stored_slot = read_u64(&mut data)?;
            if stored_slot != slot_size {
                return Err(StorageError::InvalidArgument(format!(
                    "record file {} uses {}-byte slots, opened with {}",
                    data_path.display(),
                    stored_slot,
                    slot_size
                )));
            }
            if cursor < PRELUDE_SIZE || (cursor - PRELUDE_SIZE) % slot_size != 0 {
                return Err(StorageError::Corruption(format!(
                    "record file cursor {} is not on a slot boundary",
                    cursor
                )));
            }
            let mut payload = [0u8; HEADER_PAYLOAD_SIZE];
            data.read_exact(&mut payload)?;
            let header = bincode::deserialize(&payload).map_err(|e| {
                StorageError::Corruption(format!("failed to decode table header: {}", e))
            })?;
            (cursor, header)
        };

        let pool_len = pool.metadata()?.len();
        let (pool_cursor, block_capacity, free) = if pool_len == 0 {
            (POOL_START, config.pool_block_capacity, Vec::new())
        } else {
            pool.seek(SeekFrom::Start(0))?;
            let cursor = read_u64(&mut pool)?;
            let capacity = read_u64(&mut pool)? as usize;
            if capacity == 0 || cursor < POOL_START || cursor > pool_len {
                return Err(StorageError::Corruption(format!(
                    "pool file {} has an invalid cursor {} (capacity {})",
                    pool_path.display(),
                    cursor,
                    capacity
                )));
            }
            let mut free = Vec::new();
            if pool_len > cursor {
                pool.seek(SeekFrom::Start(cursor))?;
                let count = read_u64(&mut pool)? as usize;
                for _ in 0..count {
                    free.push(Address::new(read_u64(&mut pool)?));
                }
            }
            (cursor, capacity, free)
        };

        debug!(
            target: "bptstore::storage",
            path = %data_path.display(),
            slot_size,
            data_cursor,
            buffered_free = free.len(),
            fresh,
            "opened paged file"
        );

        let mut file = Self {
            data_path,
            data,
            pool,
            slot_size,
            data_cursor,
            pool_cursor,
            block_capacity,
            free,
            header,
            fresh,
            sync_on_close: config.sync_on_close,
            closed: false,
        };
        if fresh {
            file.write_prelude()?;
        }
        Ok(file)
    }

    /// Allocate one slot, reusing a freed address when the pool has one.
    pub fn new_space(&mut self) -> Result<Address> {
        if self.free.is_empty() && self.pool_cursor > POOL_START {
            self.reload_block()?;
        }
        if let Some(addr) = self.free.pop() {
            return Ok(addr);
        }
        let addr = Address::new(self.data_cursor);
        self.data_cursor += self.slot_size;
        Ok(addr)
    }

    /// Release a slot. The tail slot shrinks the file instead of entering the pool.
    pub fn delete_space(&mut self, addr: Address) -> Result<()> {
        self.check_address(addr)?;
        if addr.offset() + self.slot_size == self.data_cursor {
            self.data_cursor -= self.slot_size;
            return Ok(());
        }
        // a reloaded block leaves the buffer full, so spill before pushing
        if self.free.len() >= self.block_capacity {
            self.spill_block()?;
        }
        self.free.push(addr);
        Ok(())
    }

    pub fn read_slot(&mut self, addr: Address, buf: &mut [u8]) -> Result<()> {
        self.check_address(addr)?;
        self.check_buffer(buf.len())?;
        self.data.seek(SeekFrom::Start(addr.offset()))?;
        self.data.read_exact(buf)?;
        Ok(())
    }

    pub fn write_slot(&mut self, addr: Address, buf: &[u8]) -> Result<()> {
        self.check_address(addr)?;
        self.check_buffer(buf.len())?;
        self.data.seek(SeekFrom::Start(addr.offset()))?;
        self.data.write_all(buf)?;
        Ok(())
    }

    pub fn header(&self) -> &H {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut H {
        &mut self.header
    }

    /// True when this open created the record file.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Logical end of the record file
    pub fn data_end(&self) -> u64 {
        self.data_cursor
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size as usize
    }

    /// Freed addresses available for reuse (buffered + persisted blocks)
    pub fn free_slots(&self) -> usize {
        let blocks = ((self.pool_cursor - POOL_START) / self.block_bytes()) as usize;
        self.free.len() + blocks * self.block_capacity
    }

    pub fn path(&self) -> &Path {
        &self.data_path
    }

    /// Persist the prelude, header and pool state without closing.
    pub fn checkpoint(&mut self) -> Result<()> {
        self.write_prelude()?;

        self.pool.seek(SeekFrom::Start(0))?;
        self.pool.write_all(&self.pool_cursor.to_le_bytes())?;
        self.pool.write_all(&(self.block_capacity as u64).to_le_bytes())?;

        let mut tail = Vec::with_capacity(8 + self.free.len() * 8);
        tail.extend_from_slice(&(self.free.len() as u64).to_le_bytes());
        for addr in &self.free {
            tail.extend_from_slice(&addr.offset().to_le_bytes());
        }
        self.pool.seek(SeekFrom::Start(self.pool_cursor))?;
        self.pool.write_all(&tail)?;
        self.pool.set_len(self.pool_cursor + tail.len() as u64)?;

        self.data.set_len(self.data_cursor)?;
        if self.sync_on_close {
            self.data.sync_all()?;
            self.pool.sync_all()?;
        }
        Ok(())
    }

    /// Write everything back and release the files.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    /// Final checkpoint for owners that close in place; later drops are no-ops.
    pub(crate) fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.checkpoint()?;
        debug!(
            target: "bptstore::storage",
            path = %self.data_path.display(),
            data_cursor = self.data_cursor,
            free_slots = self.free_slots(),
            "closed paged file"
        );
        Ok(())
    }

    fn write_prelude(&mut self) -> Result<()> {
        let payload = bincode::serialize(&self.header)?;
        if payload.len() > HEADER_PAYLOAD_SIZE {
            return Err(StorageError::Serialization(format!(
                "table header needs {} bytes, prelude holds {}",
                payload.len(),
                HEADER_PAYLOAD_SIZE
            )));
        }
        let mut buf = [0u8; PRELUDE_SIZE as usize];
        buf[..8].copy_from_slice(&self.data_cursor.to_le_bytes());
        buf[8..16].copy_from_slice(&self.slot_size.to_le_bytes());
        buf[16..16 + payload.len()].copy_from_slice(&payload);
        self.data.seek(SeekFrom::Start(0))?;
        self.data.write_all(&buf)?;
        Ok(())
    }

    fn block_bytes(&self) -> u64 {
        8 + 8 * self.block_capacity as u64
    }

    fn spill_block(&mut self) -> Result<()> {
        let mut block = Vec::with_capacity(self.block_bytes() as usize);
        block.extend_from_slice(&(self.free.len() as u64).to_le_bytes());
        for addr in &self.free {
            block.extend_from_slice(&addr.offset().to_le_bytes());
        }
        self.pool.seek(SeekFrom::Start(self.pool_cursor))?;
        self.pool.write_all(&block)?;
        self.pool_cursor += self.block_bytes();
        trace!(
            target: "bptstore::storage",
            pool_cursor = self.pool_cursor,
            count = self.free.len(),
            "spilled pool block"
        );
        self.free.clear();
        Ok(())
    }

    fn reload_block(&mut self) -> Result<()> {
        self.pool_cursor -= self.block_bytes();
        self.pool.seek(SeekFrom::Start(self.pool_cursor))?;
        let count = read_u64(&mut self.pool)? as usize;
        if count > self.block_capacity {
            return Err(StorageError::Corruption(format!(
                "pool block at {} claims {} entries (capacity {})",
                self.pool_cursor, count, self.block_capacity
            )));
        }
        for _ in 0..count {
            self.free.push(Address::new(read_u64(&mut self.pool)?));
        }
        trace!(
            target: "bptstore::storage",
            pool_cursor = self.pool_cursor,
            count,
            "reloaded pool block"
        );
        Ok(())
    }

    fn check_address(&self, addr: Address) -> Result<()> {
        let offset = addr.offset();
        if offset < PRELUDE_SIZE
            || offset >= self.data_cursor
            || (offset - PRELUDE_SIZE) % self.slot_size != 0
        {
            return Err(StorageError::InvalidArgument(format!(
                "address {} is not an allocated slot (end {})",
                addr, self.data_cursor
            )));
        }
        Ok(())
    }

    fn check_buffer(&self, len: usize) -> Result<()> {
        if len as u64 != self.slot_size {
            return Err(StorageError::InvalidArgument(format!(
                "slot buffer is {} bytes, slots are {}",
                len, self.slot_size
            )));
        }
        Ok(())
    }
}

impl<H: TableHeader> Drop for PagedFile<H> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.checkpoint() {
            warn!(
                target: "bptstore::storage",
                path = %self.data_path.display(),
                error = %e,
                "failed to persist paged file on drop"
            );
        }
    }
}
