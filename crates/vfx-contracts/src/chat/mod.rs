mod command_registry;
mod intent_parser;

pub use command_registry::CONSOLE_HELP;
pub use intent_parser::{parse_intent, Intent};
