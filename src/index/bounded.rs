//! Fixed-capacity vector used for node entries and child addresses
//!
//! A node is serialized into a slot of constant size, so its arrays never grow
//! past the capacity chosen when the node was created. Overflowing one is a
//! structural bug and is reported as an error instead of reallocating.

use crate::{Result, StorageError};
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedVec<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> BoundedVec<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn push(&mut self, item: T) -> Result<()> {
        self.ensure_room(1)?;
        self.items.push(item);
        Ok(())
    }

    /// Shift `[index..]` right by one and place `item` at `index`.
    pub fn insert(&mut self, index: usize, item: T) -> Result<()> {
        self.ensure_room(1)?;
        if index > self.items.len() {
            return Err(StorageError::Index(format!(
                "insert position {} past length {}",
                index,
                self.items.len()
            )));
        }
        self.items.insert(index, item);
        Ok(())
    }

    /// Remove the item at `index`, shifting the tail left.
    ///
    /// Panics if `index` is out of bounds, like `Vec::remove`.
    pub fn remove(&mut self, index: usize) -> T {
        self.items.remove(index)
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Move `[at..]` into a new vector of the same capacity.
    pub fn split_off(&mut self, at: usize) -> Self {
        Self {
            items: self.items.split_off(at),
            capacity: self.capacity,
        }
    }

    /// Move every item of `other` onto the end of `self`.
    pub fn append(&mut self, other: &mut Self) -> Result<()> {
        self.ensure_room(other.items.len())?;
        self.items.append(&mut other.items);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn ensure_room(&self, extra: usize) -> Result<()> {
        if self.items.len() + extra > self.capacity {
            return Err(StorageError::Index(format!(
                "bounded vector overflow: {} + {} exceeds capacity {}",
                self.items.len(),
                extra,
                self.capacity
            )));
        }
        Ok(())
    }
}

impl<T> Deref for BoundedVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> DerefMut for BoundedVec<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}
