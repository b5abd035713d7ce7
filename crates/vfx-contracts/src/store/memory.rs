use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::KeyValueStore;
use crate::error::StorageError;

/// In-memory store; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    values: BTreeMap<String, String>,
    writes: u64,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation.
    pub fn writes(&self) -> u64 {
        self.lock().map(|inner| inner.writes).unwrap_or_default()
    }

    /// Makes every following write fail with `StorageError::Rejected`.
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut inner) = self.lock() {
            inner.fail_writes = fail;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StorageError> {
        self.inner.lock().map_err(|_| StorageError::Rejected {
            key: String::new(),
            reason: "memory store lock poisoned".to_string(),
        })
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.lock()?;
        if inner.fail_writes {
            return Err(StorageError::Rejected {
                key: key.to_string(),
                reason: "quota exceeded".to_string(),
            });
        }
        inner.values.insert(key.to_string(), value.to_string());
        inner.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::store::KeyValueStore;

    #[test]
    fn clones_share_values_and_counters() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let other = store.clone();
        other.write("k", "v")?;
        assert_eq!(store.read("k")?.as_deref(), Some("v"));
        assert_eq!(store.writes(), 1);
        Ok(())
    }

    #[test]
    fn failing_writes_leave_values_untouched() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.write("k", "v")?;
        store.set_fail_writes(true);
        assert!(store.write("k", "changed").is_err());
        assert_eq!(store.read("k")?.as_deref(), Some("v"));
        assert_eq!(store.writes(), 1);
        Ok(())
    }
}
