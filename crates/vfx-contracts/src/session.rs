use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{StudioError, StudioResult};
use crate::schema::SchemaRegistry;

/// Everything the enhancer panel lets the user pick.
///
/// `selections` only holds fields that differ from their default; setting a
/// field back to its default removes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    pub core_prompt: String,
    pub selections: IndexMap<String, String>,
    pub negative_keywords: String,
    pub image_attached: bool,
    pub active_preamble: String,
}

impl SelectionState {
    pub fn new(active_preamble: impl Into<String>) -> Self {
        Self {
            active_preamble: active_preamble.into(),
            ..Self::default()
        }
    }

    /// Current value of `key`, the field default when unset.
    pub fn value<'a>(&'a self, registry: &'a SchemaRegistry, key: &str) -> Option<&'a str> {
        let field = registry.get(key)?;
        Some(
            self.selections
                .get(key)
                .map(String::as_str)
                .unwrap_or(field.default.as_str()),
        )
    }

    pub fn set(&mut self, registry: &SchemaRegistry, key: &str, value: &str) -> StudioResult<()> {
        let field = registry.require(key)?;
        if !field.accepts(value) {
            return Err(StudioError::validation(format!(
                "'{value}' is not a valid {}",
                field.title
            )));
        }
        if field.is_default(value) || value.trim().is_empty() {
            self.selections.shift_remove(key);
        } else {
            self.selections.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    pub fn unset(&mut self, key: &str) -> bool {
        self.selections.shift_remove(key).is_some()
    }

    pub fn is_modified(&self, key: &str) -> bool {
        self.selections.contains_key(key)
    }

    /// Resets every selection and text input. The active preamble stays.
    pub fn clear(&mut self) {
        self.core_prompt.clear();
        self.selections.clear();
        self.negative_keywords.clear();
        self.image_attached = false;
    }

    pub fn apply_seed(&mut self, registry: &SchemaRegistry, seed: &SessionSeed) -> StudioResult<()> {
        if let Some(core_prompt) = &seed.core_prompt {
            self.core_prompt = core_prompt.clone();
        }
        if let Some(negative) = &seed.negative_keywords {
            self.negative_keywords = negative.clone();
        }
        if seed.image_attached {
            self.image_attached = true;
        }
        for (key, value) in &seed.selections {
            self.set(registry, key, value)?;
        }
        Ok(())
    }
}

/// Values pre-filled into a freshly opened enhancer, typically taken from
/// the host page's prompt box.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSeed {
    #[serde(default)]
    pub core_prompt: Option<String>,
    #[serde(default)]
    pub negative_keywords: Option<String>,
    #[serde(default)]
    pub image_attached: bool,
    #[serde(default)]
    pub selections: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionTicket(u64);

impl SessionTicket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// Hands out a ticket per opened session so that results arriving after
/// their session closed can be recognized and dropped.
#[derive(Debug, Default)]
pub struct SessionClock {
    generation: u64,
    open: bool,
}

impl SessionClock {
    pub fn open(&mut self) -> SessionTicket {
        self.generation += 1;
        self.open = true;
        SessionTicket(self.generation)
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn current(&self) -> Option<SessionTicket> {
        self.open.then_some(SessionTicket(self.generation))
    }

    pub fn is_current(&self, ticket: SessionTicket) -> bool {
        self.current() == Some(ticket)
    }
}
