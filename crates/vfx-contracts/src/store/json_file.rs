use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::KeyValueStore;
use crate::error::StorageError;

/// Key-value store backed by a single JSON object file.
///
/// Reads always hit the file. Writes re-read the file, replace one key and
/// rewrite the whole object, so keys written by another handle survive.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                tracing::warn!(path = %self.path.display(), "store file is not a JSON object; starting empty");
                Ok(Map::new())
            }
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let payload = self.load()?;
        Ok(payload.get(key).map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut on_disk = self.load()?;
        on_disk.insert(key.to_string(), Value::String(value.to_string()));

        let io_err = |source: std::io::Error| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let rendered = serde_json::to_string_pretty(&Value::Object(on_disk)).map_err(|source| {
            StorageError::Encode {
                key: key.to_string(),
                source,
            }
        })?;
        std::fs::write(&self.path, rendered).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::JsonFileStore;
    use crate::store::KeyValueStore;

    #[test]
    fn missing_file_reads_as_empty() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = JsonFileStore::new(temp.path().join("nested/store.json"));
        assert_eq!(store.read("anything")?, None);
        Ok(())
    }

    #[test]
    fn write_creates_parent_and_round_trips() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested/store.json");
        let store = JsonFileStore::new(&path);
        store.write("key", "{\"a\":1}")?;

        assert_eq!(store.read("key")?.as_deref(), Some("{\"a\":1}"));
        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        assert_eq!(parsed["key"], Value::String("{\"a\":1}".to_string()));
        Ok(())
    }

    #[test]
    fn writes_merge_with_other_handles() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("store.json");
        let store_a = JsonFileStore::new(&path);
        let store_b = JsonFileStore::new(&path);

        store_a.write("a", "1")?;
        store_b.write("b", "2")?;
        store_a.write("c", "3")?;

        let reloaded = JsonFileStore::new(path);
        assert_eq!(reloaded.read("a")?.as_deref(), Some("1"));
        assert_eq!(reloaded.read("b")?.as_deref(), Some("2"));
        assert_eq!(reloaded.read("c")?.as_deref(), Some("3"));
        Ok(())
    }

    #[test]
    fn reads_see_writes_from_other_handles() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("store.json");
        let store_a = JsonFileStore::new(&path);
        let store_b = JsonFileStore::new(&path);

        store_a.write("key", "first")?;
        assert_eq!(store_b.read("key")?.as_deref(), Some("first"));
        store_b.write("key", "second")?;
        assert_eq!(store_a.read("key")?.as_deref(), Some("second"));
        Ok(())
    }

    #[test]
    fn corrupt_file_is_replaced_on_write() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("store.json");
        std::fs::write(&path, "not json at all")?;
        let store = JsonFileStore::new(&path);

        assert_eq!(store.read("key")?, None);
        store.write("key", "value")?;
        assert_eq!(store.read("key")?.as_deref(), Some("value"));
        Ok(())
    }
}
