use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{read_json_blob, write_json_blob, KeyValueStore, HISTORY_KEY};
use crate::error::StudioResult;

pub const MAX_HISTORY_ITEMS: usize = 50;

/// One submitted prompt and what came back for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub ts: String,
    pub preamble: String,
    /// The user's own text, before composition.
    #[serde(default)]
    pub core_prompt: String,
    /// The full composed prompt that was sent.
    pub prompt: String,
    #[serde(default)]
    pub results: Vec<String>,
}

/// Bounded, newest-first log of submitted prompts.
#[derive(Debug, Clone)]
pub struct PromptHistory<S> {
    store: S,
}

impl<S: KeyValueStore> PromptHistory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds an entry at the front. Resubmitting the newest prompt under the
    /// same preamble replaces that entry instead of stacking a duplicate.
    pub fn record(
        &self,
        preamble: &str,
        core_prompt: &str,
        prompt: &str,
        results: &[String],
    ) -> StudioResult<HistoryEntry> {
        let entry = HistoryEntry {
            id: fingerprint(preamble, prompt),
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            preamble: preamble.to_string(),
            core_prompt: core_prompt.to_string(),
            prompt: prompt.to_string(),
            results: results.to_vec(),
        };
        let mut entries = self.entries()?;
        if entries.first().map(|newest| newest.id == entry.id).unwrap_or(false) {
            entries.remove(0);
        }
        entries.insert(0, entry.clone());
        entries.truncate(MAX_HISTORY_ITEMS);
        write_json_blob(&self.store, HISTORY_KEY, &entries)?;
        Ok(entry)
    }

    pub fn entries(&self) -> StudioResult<Vec<HistoryEntry>> {
        Ok(read_json_blob(&self.store, HISTORY_KEY)?)
    }

    pub fn clear(&self) -> StudioResult<()> {
        write_json_blob(&self.store, HISTORY_KEY, &Vec::<HistoryEntry>::new())?;
        Ok(())
    }
}

fn fingerprint(preamble: &str, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(preamble.as_bytes());
    hasher.update([0u8]);
    hasher.update(prompt.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::{PromptHistory, MAX_HISTORY_ITEMS};
    use crate::store::{JsonFileStore, MemoryStore};

    #[test]
    fn newest_entries_come_first() -> anyhow::Result<()> {
        let history = PromptHistory::new(MemoryStore::new());
        history.record("P", "first", "P\n\nfirst", &[])?;
        history.record("P", "second", "P\n\nsecond\n\n--neg fog", &["out".to_string()])?;

        let entries = history.entries()?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].core_prompt, "second");
        assert!(entries[0].prompt.ends_with("--neg fog"));
        assert_eq!(entries[0].results, vec!["out".to_string()]);
        assert_eq!(entries[1].core_prompt, "first");
        Ok(())
    }

    #[test]
    fn resubmitting_the_newest_prompt_collapses() -> anyhow::Result<()> {
        let history = PromptHistory::new(MemoryStore::new());
        history.record("P", "same", "same", &["a".to_string()])?;
        history.record("P", "same", "same", &["b".to_string()])?;
        history.record("Other", "same", "same", &[])?;

        let entries = history.entries()?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].results, vec!["b".to_string()]);
        assert_ne!(entries[0].id, entries[1].id);
        Ok(())
    }

    #[test]
    fn history_is_capped() -> anyhow::Result<()> {
        let history = PromptHistory::new(MemoryStore::new());
        for idx in 0..(MAX_HISTORY_ITEMS + 5) {
            let prompt = format!("prompt {idx}");
            history.record("P", &prompt, &prompt, &[])?;
        }
        let entries = history.entries()?;
        assert_eq!(entries.len(), MAX_HISTORY_ITEMS);
        assert_eq!(entries[0].prompt, format!("prompt {}", MAX_HISTORY_ITEMS + 4));
        Ok(())
    }

    #[test]
    fn clear_persists_an_empty_log() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("store.json");
        let history = PromptHistory::new(JsonFileStore::new(&path));
        history.record("P", "x", "x", &[])?;
        history.clear()?;
        assert!(PromptHistory::new(JsonFileStore::new(&path)).entries()?.is_empty());
        Ok(())
    }
}
