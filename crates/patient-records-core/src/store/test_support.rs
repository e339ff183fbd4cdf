use crate::storage::{KeyValueStore, MemoryStorage, StorageError, StorageResult};

/// Memory storage that rejects writes to one key once armed.
pub(crate) struct FailingKeyStorage {
    pub inner: MemoryStorage,
    pub fail_key: String,
    pub armed: bool,
}

impl FailingKeyStorage {
    pub fn new(fail_key: &str) -> Self {
        Self {
            inner: MemoryStorage::new(),
            fail_key: fail_key.to_string(),
            armed: false,
        }
    }
}

impl KeyValueStore for FailingKeyStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        if self.armed && key == self.fail_key {
            return Err(StorageError::CapacityExceeded {
                requested: value.len(),
                capacity: 0,
            });
        }
        self.inner.set(key, value)
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.inner.remove(key)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        self.inner.keys()
    }

    fn used_bytes(&self) -> StorageResult<usize> {
        self.inner.used_bytes()
    }

    fn capacity_bytes(&self) -> usize {
        self.inner.capacity_bytes()
    }
}
