use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{read_json_blob, write_json_blob, KeyValueStore, PRESETS_KEY};
use crate::error::{StudioError, StudioResult};
use crate::schema::SchemaRegistry;
use crate::session::SelectionState;

/// Saved enhancer inputs. The image attachment is not part of a preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub core_prompt: String,
    #[serde(default)]
    pub selections: IndexMap<String, String>,
    #[serde(default)]
    pub negative_keywords: String,
    #[serde(default)]
    pub active_preamble: String,
}

impl Preset {
    pub fn from_state(state: &SelectionState) -> Self {
        Self {
            core_prompt: state.core_prompt.clone(),
            selections: state.selections.clone(),
            negative_keywords: state.negative_keywords.clone(),
            active_preamble: state.active_preamble.clone(),
        }
    }

    /// Rebuilds a selection state. Selections the registry no longer accepts
    /// are dropped with a warning.
    pub fn to_state(&self, registry: &SchemaRegistry) -> SelectionState {
        let mut state = SelectionState::new(self.active_preamble.clone());
        state.core_prompt = self.core_prompt.clone();
        state.negative_keywords = self.negative_keywords.clone();
        for (key, value) in &self.selections {
            if let Err(err) = state.set(registry, key, value) {
                tracing::warn!(key = %key, value = %value, error = %err, "dropping stale preset selection");
            }
        }
        state
    }
}

/// Named presets in save order, persisted as one collection.
#[derive(Debug, Clone)]
pub struct PresetStore<S> {
    store: S,
}

impl<S: KeyValueStore> PresetStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn save(&self, name: &str, state: &SelectionState) -> StudioResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StudioError::validation("Preset name cannot be empty."));
        }
        let mut presets = self.all()?;
        presets.insert(name.to_string(), Preset::from_state(state));
        write_json_blob(&self.store, PRESETS_KEY, &presets)?;
        tracing::info!(name, "saved preset");
        Ok(())
    }

    pub fn get(&self, name: &str) -> StudioResult<Option<Preset>> {
        Ok(self.all()?.shift_remove(name.trim()))
    }

    /// `None` when no preset has that name.
    pub fn load(
        &self,
        name: &str,
        registry: &SchemaRegistry,
    ) -> StudioResult<Option<SelectionState>> {
        Ok(self.get(name)?.map(|preset| preset.to_state(registry)))
    }

    pub fn list(&self) -> StudioResult<Vec<String>> {
        Ok(self.all()?.into_keys().collect())
    }

    /// Returns `false` without writing when no preset has that name.
    pub fn delete(&self, name: &str) -> StudioResult<bool> {
        let mut presets = self.all()?;
        if presets.shift_remove(name.trim()).is_none() {
            return Ok(false);
        }
        write_json_blob(&self.store, PRESETS_KEY, &presets)?;
        tracing::info!(name, "deleted preset");
        Ok(true)
    }

    fn all(&self) -> StudioResult<IndexMap<String, Preset>> {
        Ok(read_json_blob(&self.store, PRESETS_KEY)?)
    }
}

#[cfg(test)]
mod tests {
    use super::PresetStore;
    use crate::schema::SchemaRegistry;
    use crate::session::SelectionState;
    use crate::store::{KeyValueStore, MemoryStore, PRESETS_KEY};

    fn sample_state(registry: &SchemaRegistry) -> anyhow::Result<SelectionState> {
        let mut state = SelectionState::new("Goldie Custom");
        state.core_prompt = "a lighthouse in a storm".to_string();
        state.negative_keywords = "people".to_string();
        state.image_attached = true;
        state.set(registry, "shot_size", "Extreme Wide Shot (EWS/ELS)")?;
        Ok(state)
    }

    #[test]
    fn save_then_load_restores_everything_but_the_image() -> anyhow::Result<()> {
        let registry = SchemaRegistry::builtin();
        let presets = PresetStore::new(MemoryStore::new());
        let state = sample_state(&registry)?;
        presets.save("Storm", &state)?;

        let loaded = presets
            .load("Storm", &registry)?
            .ok_or_else(|| anyhow::anyhow!("preset missing"))?;
        assert_eq!(loaded.core_prompt, state.core_prompt);
        assert_eq!(loaded.selections, state.selections);
        assert_eq!(loaded.negative_keywords, "people");
        assert_eq!(loaded.active_preamble, "Goldie Custom");
        assert!(!loaded.image_attached);
        Ok(())
    }

    #[test]
    fn missing_preset_loads_as_none() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let presets = PresetStore::new(store.clone());
        assert!(presets.load("nope", &SchemaRegistry::builtin())?.is_none());
        assert_eq!(store.writes(), 0);
        Ok(())
    }

    #[test]
    fn list_keeps_save_order_and_overwrites_in_place() -> anyhow::Result<()> {
        let registry = SchemaRegistry::builtin();
        let presets = PresetStore::new(MemoryStore::new());
        let state = sample_state(&registry)?;
        presets.save("b", &state)?;
        presets.save("a", &state)?;
        presets.save(" b ", &SelectionState::default())?;

        assert_eq!(presets.list()?, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(presets.get("b")?.unwrap().core_prompt, "");
        Ok(())
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let presets = PresetStore::new(store.clone());
        presets.save("one", &SelectionState::default())?;
        let writes = store.writes();

        assert!(!presets.delete("two")?);
        assert_eq!(store.writes(), writes);
        assert!(presets.delete("one")?);
        assert!(presets.list()?.is_empty());
        Ok(())
    }

    #[test]
    fn empty_names_are_rejected() {
        let presets = PresetStore::new(MemoryStore::new());
        let err = presets.save("  ", &SelectionState::default()).err().unwrap();
        assert!(err.is_validation());
    }

    #[test]
    fn stale_selections_are_dropped_on_load() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.write(
            PRESETS_KEY,
            r#"{"old":{"core_prompt":"x","selections":{"shot_size":"Gone Value","removed_field":"y","camera_angle":"Low Angle (Looking Up)"}}}"#,
        )?;
        let registry = SchemaRegistry::builtin();
        let loaded = PresetStore::new(store)
            .load("old", &registry)?
            .ok_or_else(|| anyhow::anyhow!("preset missing"))?;
        assert_eq!(loaded.core_prompt, "x");
        assert_eq!(loaded.selections.len(), 1);
        assert!(loaded.is_modified("camera_angle"));
        Ok(())
    }
}
