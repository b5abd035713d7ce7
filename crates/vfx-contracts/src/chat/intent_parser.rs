use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, APPLY_SUGGESTION_COMMAND, EDIT_PREAMBLE_COMMAND, NO_ARG_COMMANDS,
    SAVE_PREAMBLE_COMMAND, SET_FIELD_COMMAND, SINGLE_ARG_COMMANDS, TEXT_ARG_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }

    fn with_arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.command_args.insert(key.to_string(), value.into());
        self
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.command_args.get(key).and_then(Value::as_str)
    }

    pub fn arg_u64(&self, key: &str) -> Option<u64> {
        self.command_args.get(key).and_then(Value::as_u64)
    }
}

fn find_spec(command: &str, specs: &[CommandSpec]) -> Option<CommandSpec> {
    specs.iter().find(|spec| spec.command == command).copied()
}

fn split_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    }
}

fn single_arg(arg: &str) -> String {
    split_args(arg).join(" ")
}

/// Splits `head rest...` where only the head is a single token.
fn head_and_rest(arg: &str) -> (String, String) {
    let mut parts = split_args(arg);
    if parts.is_empty() {
        return (String::new(), String::new());
    }
    let head = parts.remove(0);
    (head, parts.join(" "))
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(spec) = find_spec(&command, TEXT_ARG_COMMANDS) {
                return Intent::new(spec.action, text).with_arg(spec.arg, arg);
            }

            if let Some(spec) = find_spec(&command, SINGLE_ARG_COMMANDS) {
                return Intent::new(spec.action, text).with_arg(spec.arg, single_arg(arg));
            }

            if let Some(spec) = find_spec(&command, NO_ARG_COMMANDS) {
                return Intent::new(spec.action, text);
            }

            if command == SET_FIELD_COMMAND.command {
                let (key, value) = head_and_rest(arg);
                return Intent::new(SET_FIELD_COMMAND.action, text)
                    .with_arg(SET_FIELD_COMMAND.arg, key)
                    .with_arg("value", value);
            }

            if let Some(spec) = [SAVE_PREAMBLE_COMMAND, EDIT_PREAMBLE_COMMAND]
                .into_iter()
                .find(|spec| spec.command == command)
            {
                let (name, path) = head_and_rest(arg);
                return Intent::new(spec.action, text)
                    .with_arg(spec.arg, name)
                    .with_arg("path", path);
            }

            if command == APPLY_SUGGESTION_COMMAND.command {
                let index = arg
                    .parse::<u64>()
                    .map(Value::from)
                    .unwrap_or(Value::Null);
                return Intent::new(APPLY_SUGGESTION_COMMAND.action, text)
                    .with_arg(APPLY_SUGGESTION_COMMAND.arg, index);
            }

            return Intent::new("unknown", text)
                .with_arg("command", command)
                .with_arg("arg", arg);
        }
    }

    let mut intent = Intent::new("set_prompt", text).with_arg("text", raw_trimmed);
    intent.prompt = Some(raw_trimmed.to_string());
    intent
}
