use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use similar::TextDiff;

use crate::error::{StudioError, StudioResult};
use crate::schema::SchemaRegistry;
use crate::store::{
    read_json_blob, write_json_blob, KeyValueStore, CUSTOM_PREAMBLES_KEY, SELECTED_PREAMBLE_KEY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreambleStatus {
    Default,
    CustomOverride,
    Custom,
}

impl PreambleStatus {
    pub fn group_label(self) -> &'static str {
        match self {
            Self::Default => "Default Preambles",
            Self::CustomOverride => "Customized Defaults",
            Self::Custom => "Custom Preambles",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreambleEntry {
    pub name: String,
    pub text: String,
    pub status: PreambleStatus,
    pub required_fields: Option<Vec<String>>,
}

impl PreambleEntry {
    /// Whether "save changes" may write this entry in place. Unmodified
    /// built-ins must be saved as an override or under a new name.
    pub fn is_editable(&self) -> bool {
        self.status != PreambleStatus::Default
    }

    /// Required fields currently left at their default. Advisory only.
    pub fn missing_required_fields<'a>(
        &'a self,
        registry: &SchemaRegistry,
        selections: &IndexMap<String, String>,
    ) -> Vec<&'a str> {
        let Some(required) = &self.required_fields else {
            return Vec::new();
        };
        required
            .iter()
            .filter(|key| {
                let Some(field) = registry.get(key) else {
                    return false;
                };
                selections
                    .get(key.as_str())
                    .map(|value| value.trim().is_empty() || field.is_default(value))
                    .unwrap_or(true)
            })
            .map(String::as_str)
            .collect()
    }
}

pub type PreambleMap = IndexMap<String, PreambleEntry>;

#[derive(Debug, Clone, Copy)]
pub struct BuiltinPreamble {
    pub name: &'static str,
    pub text: &'static str,
    pub requires: Option<&'static [&'static str]>,
}

pub const BUILTIN_PREAMBLES: &[BuiltinPreamble] = &[
    BuiltinPreamble {
        name: "Cinematic Storyteller",
        text: include_str!("../../resources/preambles/cinematic_storyteller.txt"),
        requires: Some(&["shot_size", "camera_movement"]),
    },
    BuiltinPreamble {
        name: "Veo 2 Lexicon Guide",
        text: include_str!("../../resources/preambles/veo_2_lexicon_guide.txt"),
        requires: None,
    },
    BuiltinPreamble {
        name: "Gemini Veo Pro Enhancer",
        text: include_str!("../../resources/preambles/gemini_veo_pro_enhancer.txt"),
        requires: None,
    },
    BuiltinPreamble {
        name: "Veo Adherence Focus",
        text: include_str!("../../resources/preambles/veo_adherence_focus.txt"),
        requires: Some(&["camera_angle", "camera_movement", "lighting_style_atmosphere"]),
    },
    BuiltinPreamble {
        name: "Goldie Custom",
        text: include_str!("../../resources/preambles/goldie_custom.txt"),
        requires: None,
    },
];

/// Built-in instruction templates merged with the user's persisted texts.
///
/// Persisted storage is the source of truth: nothing is cached between
/// calls, so every read reflects the last successful write.
#[derive(Debug, Clone)]
pub struct PreambleStore<S> {
    store: S,
    builtins: PreambleMap,
}

impl<S: KeyValueStore> PreambleStore<S> {
    pub fn new(store: S) -> Self {
        Self::with_builtins(store, BUILTIN_PREAMBLES)
    }

    pub fn with_builtins(store: S, builtins: &[BuiltinPreamble]) -> Self {
        let builtins = builtins
            .iter()
            .map(|builtin| {
                (
                    builtin.name.to_string(),
                    PreambleEntry {
                        name: builtin.name.to_string(),
                        text: builtin.text.to_string(),
                        status: PreambleStatus::Default,
                        required_fields: builtin
                            .requires
                            .map(|keys| keys.iter().map(|key| (*key).to_string()).collect()),
                    },
                )
            })
            .collect();
        Self { store, builtins }
    }

    pub fn first_builtin(&self) -> Option<&str> {
        self.builtins.keys().next().map(String::as_str)
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    pub fn effective_preambles(&self) -> StudioResult<PreambleMap> {
        let custom = self.custom_texts()?;
        let mut merged = self.builtins.clone();
        for (name, text) in custom {
            match merged.get_mut(&name) {
                Some(entry) => {
                    entry.text = text;
                    entry.status = PreambleStatus::CustomOverride;
                }
                None => {
                    merged.insert(
                        name.clone(),
                        PreambleEntry {
                            name,
                            text,
                            status: PreambleStatus::Custom,
                            required_fields: None,
                        },
                    );
                }
            }
        }
        Ok(merged)
    }

    pub fn get(&self, name: &str) -> StudioResult<Option<PreambleEntry>> {
        Ok(self.effective_preambles()?.shift_remove(name))
    }

    pub fn save_custom_text(&self, name: &str, text: &str) -> StudioResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StudioError::validation("Preamble name cannot be empty."));
        }
        let mut custom = self.custom_texts()?;
        custom.insert(name.to_string(), text.to_string());
        write_json_blob(&self.store, CUSTOM_PREAMBLES_KEY, &custom)?;
        tracing::info!(name, builtin = self.is_builtin(name), "saved preamble text");
        Ok(())
    }

    /// Saves changes in place. Unmodified built-ins are refused; they must be
    /// overridden through `save_custom_text` or saved under a new name.
    pub fn save_changes(&self, name: &str, text: &str) -> StudioResult<()> {
        let name = name.trim();
        let Some(entry) = self.get(name)? else {
            return Err(StudioError::not_found("preamble", name));
        };
        if !entry.is_editable() {
            return Err(StudioError::validation(format!(
                "'{name}' is a default preamble; save it as a new preamble instead."
            )));
        }
        self.save_custom_text(name, text)
    }

    /// Removes a persisted override or custom entry. Returns `false` without
    /// writing when nothing is persisted under `name`.
    pub fn delete_custom(&self, name: &str) -> StudioResult<bool> {
        let name = name.trim();
        let mut custom = self.custom_texts()?;
        if custom.shift_remove(name).is_none() {
            return Ok(false);
        }
        write_json_blob(&self.store, CUSTOM_PREAMBLES_KEY, &custom)?;
        tracing::info!(name, "deleted preamble text");
        Ok(true)
    }

    /// Last selected preamble, falling back to the first built-in when the
    /// stored name is absent or no longer resolves.
    pub fn selected(&self) -> StudioResult<String> {
        let stored = self.store.read(SELECTED_PREAMBLE_KEY)?;
        if let Some(name) = stored.filter(|name| !name.is_empty()) {
            if self.effective_preambles()?.contains_key(&name) {
                return Ok(name);
            }
        }
        Ok(self.first_builtin().unwrap_or_default().to_string())
    }

    pub fn select(&self, name: &str) -> StudioResult<()> {
        if !self.effective_preambles()?.contains_key(name) {
            return Err(StudioError::not_found("preamble", name));
        }
        self.store.write(SELECTED_PREAMBLE_KEY, name)?;
        Ok(())
    }

    /// Unified diff from the shipped text to the user's override, if any.
    /// Lines keep their terminators.
    pub fn override_diff(&self, name: &str) -> StudioResult<Option<String>> {
        let Some(builtin) = self.builtins.get(name) else {
            return Ok(None);
        };
        let Some(current) = self.get(name)? else {
            return Ok(None);
        };
        if current.status != PreambleStatus::CustomOverride {
            return Ok(None);
        }
        let diff = TextDiff::from_lines(builtin.text.as_str(), current.text.as_str());
        Ok(Some(
            diff.unified_diff().header("default", "custom").to_string(),
        ))
    }

    fn custom_texts(&self) -> StudioResult<IndexMap<String, String>> {
        Ok(read_json_blob(&self.store, CUSTOM_PREAMBLES_KEY)?)
    }
}

/// Display order: defaults, then customized defaults, then customs; each
/// group sorted case-insensitively.
pub fn display_order(preambles: &PreambleMap) -> Vec<&PreambleEntry> {
    let mut entries: Vec<&PreambleEntry> = preambles.values().collect();
    entries.sort_by(|a, b| {
        a.status
            .cmp(&b.status)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    entries
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{display_order, BuiltinPreamble, PreambleStatus, PreambleStore, BUILTIN_PREAMBLES};
    use crate::schema::SchemaRegistry;
    use crate::store::{JsonFileStore, KeyValueStore, MemoryStore, CUSTOM_PREAMBLES_KEY};

    const TEST_BUILTINS: &[BuiltinPreamble] = &[
        BuiltinPreamble {
            name: "Storyteller",
            text: "Tell a story.",
            requires: Some(&["shot_size"]),
        },
        BuiltinPreamble {
            name: "Plain",
            text: "Be plain.",
            requires: None,
        },
    ];

    fn store() -> (MemoryStore, PreambleStore<MemoryStore>) {
        let memory = MemoryStore::new();
        let preambles = PreambleStore::with_builtins(memory.clone(), TEST_BUILTINS);
        (memory, preambles)
    }

    #[test]
    fn builtins_start_as_default() -> anyhow::Result<()> {
        let (_, preambles) = store();
        let effective = preambles.effective_preambles()?;
        assert_eq!(effective.len(), 2);
        assert!(effective
            .values()
            .all(|entry| entry.status == PreambleStatus::Default));
        assert_eq!(
            effective["Storyteller"].required_fields,
            Some(vec!["shot_size".to_string()])
        );
        Ok(())
    }

    #[test]
    fn shipped_preambles_load_with_text() {
        let preambles = PreambleStore::new(MemoryStore::new());
        assert_eq!(preambles.first_builtin(), Some("Cinematic Storyteller"));
        assert_eq!(BUILTIN_PREAMBLES.len(), 5);
        for builtin in BUILTIN_PREAMBLES {
            assert!(builtin.text.contains("User provided input"), "{}", builtin.name);
        }
    }

    #[test]
    fn override_then_delete_restores_default() -> anyhow::Result<()> {
        let (_, preambles) = store();
        preambles.save_custom_text("Storyteller", "Tell it differently.")?;

        let overridden = preambles.get("Storyteller")?.unwrap();
        assert_eq!(overridden.status, PreambleStatus::CustomOverride);
        assert_eq!(overridden.text, "Tell it differently.");
        assert_eq!(
            overridden.required_fields,
            Some(vec!["shot_size".to_string()])
        );

        assert!(preambles.delete_custom("Storyteller")?);
        let restored = preambles.get("Storyteller")?.unwrap();
        assert_eq!(restored.status, PreambleStatus::Default);
        assert_eq!(restored.text, "Tell a story.");
        Ok(())
    }

    #[test]
    fn new_names_become_custom_entries() -> anyhow::Result<()> {
        let (_, preambles) = store();
        preambles.save_custom_text("  Mine  ", "My rules.")?;
        let mine = preambles.get("Mine")?.unwrap();
        assert_eq!(mine.status, PreambleStatus::Custom);
        assert_eq!(mine.required_fields, None);
        assert!(mine.is_editable());
        Ok(())
    }

    #[test]
    fn empty_name_is_rejected_without_writing() -> anyhow::Result<()> {
        let (memory, preambles) = store();
        let err = preambles.save_custom_text("", "x").err().unwrap();
        assert!(err.is_validation());
        assert!(preambles.save_custom_text("   ", "x").is_err());
        assert_eq!(memory.writes(), 0);
        assert!(memory.read(CUSTOM_PREAMBLES_KEY)?.is_none());
        Ok(())
    }

    #[test]
    fn deleting_unknown_name_is_a_noop() -> anyhow::Result<()> {
        let (memory, preambles) = store();
        assert!(!preambles.delete_custom("NeverExisted")?);
        assert!(!preambles.delete_custom("Storyteller")?);
        assert_eq!(memory.writes(), 0);
        Ok(())
    }

    #[test]
    fn failed_write_leaves_effective_set_unchanged() -> anyhow::Result<()> {
        let (memory, preambles) = store();
        preambles.save_custom_text("Mine", "v1")?;
        memory.set_fail_writes(true);

        assert!(preambles.save_custom_text("Mine", "v2").is_err());
        assert!(preambles.save_custom_text("Storyteller", "changed").is_err());
        assert!(preambles.delete_custom("Mine").is_err());

        let effective = preambles.effective_preambles()?;
        assert_eq!(effective["Mine"].text, "v1");
        assert_eq!(effective["Storyteller"].status, PreambleStatus::Default);
        Ok(())
    }

    #[test]
    fn selection_falls_back_to_first_builtin() -> anyhow::Result<()> {
        let (_, preambles) = store();
        assert_eq!(preambles.selected()?, "Storyteller");

        preambles.save_custom_text("Mine", "My rules.")?;
        preambles.select("Mine")?;
        assert_eq!(preambles.selected()?, "Mine");

        preambles.delete_custom("Mine")?;
        assert_eq!(preambles.selected()?, "Storyteller");
        assert!(preambles.select("Ghost").is_err());
        Ok(())
    }

    #[test]
    fn display_order_groups_by_status_then_name() -> anyhow::Result<()> {
        let (_, preambles) = store();
        preambles.save_custom_text("zeta", "z")?;
        preambles.save_custom_text("Alpha", "a")?;
        preambles.save_custom_text("Plain", "override")?;

        let effective = preambles.effective_preambles()?;
        let names: Vec<&str> = display_order(&effective)
            .into_iter()
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(names, vec!["Storyteller", "Plain", "Alpha", "zeta"]);
        Ok(())
    }

    #[test]
    fn override_diff_shows_changed_lines() -> anyhow::Result<()> {
        let (_, preambles) = store();
        assert_eq!(preambles.override_diff("Storyteller")?, None);
        preambles.save_custom_text("Storyteller", "Tell a short story.")?;

        let diff = preambles.override_diff("Storyteller")?.unwrap();
        assert!(diff.starts_with("--- default\n+++ custom\n"));
        assert!(diff.lines().any(|line| line == "-Tell a story."));
        assert!(diff.lines().any(|line| line == "+Tell a short story."));
        Ok(())
    }

    #[test]
    fn save_changes_only_edits_customized_entries() -> anyhow::Result<()> {
        let (memory, preambles) = store();
        let err = preambles.save_changes("Storyteller", "Edited.").err().unwrap();
        assert!(err.is_validation());
        assert!(preambles.save_changes("Nobody", "x").is_err());
        assert_eq!(memory.writes(), 0);

        preambles.save_custom_text("Storyteller", "Override.")?;
        preambles.save_changes("Storyteller", "Edited override.")?;
        preambles.save_custom_text("Mine", "Mine.")?;
        preambles.save_changes(" Mine ", "Mine, edited.")?;

        assert_eq!(preambles.get("Storyteller")?.unwrap().text, "Edited override.");
        assert_eq!(preambles.get("Mine")?.unwrap().text, "Mine, edited.");
        Ok(())
    }

    #[test]
    fn required_fields_are_advisory() {
        let registry = SchemaRegistry::builtin();
        let preambles = PreambleStore::new(MemoryStore::new());
        let entry = preambles.get("Cinematic Storyteller").unwrap().unwrap();

        let mut selections = IndexMap::new();
        assert_eq!(
            entry.missing_required_fields(&registry, &selections),
            vec!["shot_size", "camera_movement"]
        );
        selections.insert("shot_size".to_string(), "Close-Up (CU/Face)".to_string());
        assert_eq!(
            entry.missing_required_fields(&registry, &selections),
            vec!["camera_movement"]
        );
    }

    #[test]
    fn overrides_persist_across_file_handles() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("store.json");
        PreambleStore::with_builtins(JsonFileStore::new(&path), TEST_BUILTINS)
            .save_custom_text("Plain", "Be plainer.")?;

        let reopened = PreambleStore::with_builtins(JsonFileStore::new(&path), TEST_BUILTINS);
        let plain = reopened.get("Plain")?.unwrap();
        assert_eq!(plain.status, PreambleStatus::CustomOverride);
        assert_eq!(plain.text, "Be plainer.");
        Ok(())
    }
}
