//! In-process storage adapter.

use std::collections::HashMap;

use super::{check_capacity, entry_size, KeyValueStore, StorageResult, DEFAULT_CAPACITY_BYTES};

/// Map-backed storage with a byte capacity.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
    used: usize,
    capacity: usize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Create empty storage with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY_BYTES)
    }

    /// Create empty storage bounded to `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            used: 0,
            capacity,
        }
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        let old_size = self
            .entries
            .get(key)
            .map(|old| entry_size(key, old))
            .unwrap_or(0);
        let new_size = entry_size(key, value);
        check_capacity(self.used, old_size, new_size, self.capacity)?;

        self.entries.insert(key.to_string(), value.to_string());
        self.used = self.used - old_size + new_size;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        if let Some(old) = self.entries.remove(key) {
            self.used -= entry_size(key, &old);
        }
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn used_bytes(&self) -> StorageResult<usize> {
        Ok(self.used)
    }

    fn capacity_bytes(&self) -> usize {
        self.capacity
    }
}
