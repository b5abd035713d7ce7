use indexmap::IndexMap;

use crate::schema::SchemaRegistry;
use crate::session::SelectionState;

/// Emitted ahead of the core prompt whenever a reference image is attached.
pub const IMAGE_ATTACHED_MARKER: &str = "[Image Attached] ";

/// Stands in for an empty core prompt in the live preview only.
pub const CORE_PROMPT_PLACEHOLDER: &str = "[Your Core Prompt Here]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeTarget {
    Display,
    Submission,
}

/// Assembles the text sent to the prompt-generation service.
#[derive(Debug, Clone, Copy)]
pub struct PromptComposer<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> PromptComposer<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn compose(
        &self,
        target: ComposeTarget,
        preamble_text: &str,
        core_prompt: &str,
        selections: &IndexMap<String, String>,
        negative_keywords: &str,
        image_attached: bool,
    ) -> String {
        let mut out = String::new();
        if !preamble_text.is_empty() {
            out.push_str(preamble_text);
            out.push_str("\n\n");
        }
        if image_attached {
            out.push_str(IMAGE_ATTACHED_MARKER);
        }
        if core_prompt.is_empty() && target == ComposeTarget::Display {
            out.push_str(CORE_PROMPT_PLACEHOLDER);
        } else {
            out.push_str(core_prompt);
        }

        let phrases = self.selection_phrases(selections);
        if !phrases.is_empty() {
            out.push_str("\n\n");
            out.push_str(&phrases.join(". "));
        }

        let negative = negative_keywords.trim();
        if !negative.is_empty() {
            out.push_str("\n\n--neg ");
            out.push_str(negative);
        }
        out
    }

    pub fn compose_state(
        &self,
        target: ComposeTarget,
        preamble_text: &str,
        state: &SelectionState,
    ) -> String {
        self.compose(
            target,
            preamble_text,
            &state.core_prompt,
            &state.selections,
            &state.negative_keywords,
            state.image_attached,
        )
    }

    /// Rendered phrases for every non-default selection, in registry order.
    /// Keys the registry does not know are skipped.
    pub fn selection_phrases(&self, selections: &IndexMap<String, String>) -> Vec<String> {
        self.registry
            .fields()
            .filter_map(|field| {
                selections
                    .get(&field.key)
                    .and_then(|value| field.render(value))
            })
            .collect()
    }
}
