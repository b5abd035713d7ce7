mod compose;
mod preambles;
mod suggestions;

pub use compose::{ComposeTarget, PromptComposer, CORE_PROMPT_PLACEHOLDER, IMAGE_ATTACHED_MARKER};
pub use preambles::{
    display_order, BuiltinPreamble, PreambleEntry, PreambleMap, PreambleStatus, PreambleStore,
    BUILTIN_PREAMBLES,
};
pub use suggestions::{SmartSuggestion, SuggestionTable};
