//! Persisted key-value storage.
//!
//! Every collection lives under one fixed key as a single JSON text blob that
//! is read in full and written in full. There is no transactional guarantee
//! against another writer touching the same key between a read and the
//! following write.

mod history;
mod json_file;
mod memory;
mod presets;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

pub use history::{HistoryEntry, PromptHistory, MAX_HISTORY_ITEMS};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use presets::{Preset, PresetStore};

pub const CUSTOM_PREAMBLES_KEY: &str = "__videofxCustomPreambles_v1_aio";
pub const PRESETS_KEY: &str = "__videofxEnhancerPresets_v1_aio";
pub const SELECTED_PREAMBLE_KEY: &str = "__videofxPreambleSelected_v4_aio";
pub const HISTORY_KEY: &str = "videofx_prompt_history_v5_aio";

pub trait KeyValueStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write(key, value)
    }
}

/// Reads a JSON blob, treating an absent key as the empty collection.
///
/// A blob that no longer parses is reported and read as empty; it is left
/// untouched in storage until the collection is written again.
pub(crate) fn read_json_blob<S, T>(store: &S, key: &str) -> Result<T, StorageError>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned + Default,
{
    let Some(raw) = store.read(key)? else {
        return Ok(T::default());
    };
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(value),
        Err(err) => {
            tracing::warn!(key, error = %err, "ignoring unreadable stored collection");
            Ok(T::default())
        }
    }
}

pub(crate) fn write_json_blob<S, T>(store: &S, key: &str, value: &T) -> Result<(), StorageError>
where
    S: KeyValueStore + ?Sized,
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.write(key, &raw)?;
    tracing::debug!(key, bytes = raw.len(), "stored collection");
    Ok(())
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{read_json_blob, write_json_blob, KeyValueStore, MemoryStore};

    #[test]
    fn absent_and_corrupt_blobs_read_as_empty() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let empty: IndexMap<String, String> = read_json_blob(&store, "missing")?;
        assert!(empty.is_empty());

        store.write("broken", "{not json")?;
        let broken: IndexMap<String, String> = read_json_blob(&store, "broken")?;
        assert!(broken.is_empty());
        assert_eq!(store.read("broken")?.as_deref(), Some("{not json"));
        Ok(())
    }

    #[test]
    fn blobs_keep_insertion_order() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let mut map = IndexMap::new();
        map.insert("zeta".to_string(), "1".to_string());
        map.insert("alpha".to_string(), "2".to_string());
        write_json_blob(&store, "ordered", &map)?;

        let loaded: IndexMap<String, String> = read_json_blob(&store, "ordered")?;
        assert_eq!(
            loaded.keys().cloned().collect::<Vec<_>>(),
            vec!["zeta".to_string(), "alpha".to_string()]
        );
        Ok(())
    }
}
