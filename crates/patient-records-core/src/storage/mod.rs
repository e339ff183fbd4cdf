//! Key/value persistence adapters.
//!
//! The store only needs synchronous get/set/remove/enumerate on string keys
//! with a byte capacity, the same contract as browser local storage.

mod memory;
mod sqlite;

pub use memory::*;
pub use sqlite::*;

use thiserror::Error;

/// Default capacity (5 MiB, the usual browser local-storage quota).
pub const DEFAULT_CAPACITY_BYTES: usize = 5 * 1024 * 1024;

/// Storage adapter errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage capacity exceeded: {requested} bytes requested, capacity is {capacity} bytes")]
    CapacityExceeded { requested: usize, capacity: usize },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Capacity-bounded string key/value storage.
pub trait KeyValueStore {
    /// Read a value.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one. Fails without side effects
    /// when the write would exceed capacity.
    fn set(&mut self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> StorageResult<()>;

    /// Enumerate all keys.
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Bytes currently used (keys plus values).
    fn used_bytes(&self) -> StorageResult<usize>;

    /// Maximum bytes this storage accepts.
    fn capacity_bytes(&self) -> usize;
}

/// Bytes a single entry occupies.
pub(crate) fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// Check that replacing `old_size` bytes with `new_size` bytes fits.
pub(crate) fn check_capacity(
    used: usize,
    old_size: usize,
    new_size: usize,
    capacity: usize,
) -> StorageResult<()> {
    let requested = used.saturating_sub(old_size) + new_size;
    if requested > capacity {
        return Err(StorageError::CapacityExceeded {
            requested,
            capacity,
        });
    }
    Ok(())
}
