//! Cross-thread table handle
//!
//! Trees are single-writer, single-reader. `SharedTree` serializes every call
//! on one table behind a mutex so the table can be handed to several threads.

use parking_lot::Mutex;
use std::sync::Arc;

pub struct SharedTree<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for SharedTree<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedTree<T> {
    pub fn new(tree: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tree)),
        }
    }

    /// Run `f` with exclusive access to the tree.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Take the tree back once this is the last handle.
    pub fn try_unwrap(self) -> Result<T, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}
