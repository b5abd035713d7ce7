#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    pub arg: &'static str,
}

const fn spec(command: &'static str, action: &'static str, arg: &'static str) -> CommandSpec {
    CommandSpec {
        command,
        action,
        arg,
    }
}

/// Commands whose whole remainder is one free-form argument.
pub(crate) const TEXT_ARG_COMMANDS: &[CommandSpec] = &[
    spec("prompt", "set_prompt", "text"),
    spec("neg", "set_negative", "text"),
];

/// Commands taking one name or path; quotes are honoured.
pub(crate) const SINGLE_ARG_COMMANDS: &[CommandSpec] = &[
    spec("unset", "unset_field", "key"),
    spec("image", "attach_image", "path"),
    spec("preamble", "select_preamble", "name"),
    spec("preamble_delete", "delete_preamble", "name"),
    spec("preset_save", "save_preset", "name"),
    spec("preset_load", "load_preset", "name"),
    spec("preset_delete", "delete_preset", "name"),
    spec("deconstruct", "deconstruct", "path"),
    spec("describe", "image_to_prompt", "path"),
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    spec("unimage", "detach_image", ""),
    spec("suggest", "suggest", ""),
    spec("preview", "preview", ""),
    spec("conflicts", "conflicts", ""),
    spec("fields", "list_fields", ""),
    spec("presets", "list_presets", ""),
    spec("preambles", "list_preambles", ""),
    spec("history", "history", ""),
    spec("clear", "clear", ""),
    spec("generate", "generate", ""),
    spec("help", "help", ""),
    spec("quit", "quit", ""),
    spec("exit", "quit", ""),
];

pub(crate) const SET_FIELD_COMMAND: CommandSpec = spec("set", "set_field", "key");
pub(crate) const SAVE_PREAMBLE_COMMAND: CommandSpec = spec("preamble_save", "save_preamble", "name");
pub(crate) const EDIT_PREAMBLE_COMMAND: CommandSpec = spec("preamble_edit", "update_preamble", "name");
pub(crate) const APPLY_SUGGESTION_COMMAND: CommandSpec = spec("apply", "apply_suggestion", "index");

pub const CONSOLE_HELP: &[(&str, &str)] = &[
    ("/set <key> <value>", "select a value for a schema field"),
    ("/unset <key>", "reset a field to its default"),
    ("/prompt <text>", "set the core prompt (bare text does the same)"),
    ("/neg <text>", "set negative keywords"),
    ("/image <path>", "attach a reference image"),
    ("/unimage", "remove the attached image"),
    ("/preamble <name>", "switch the active preamble"),
    ("/preamble_save <name> <path>", "save a preamble text read from a file"),
    ("/preamble_edit <name> <path>", "save changes to a custom or overridden preamble"),
    ("/preamble_delete <name>", "delete a custom preamble or revert an override"),
    ("/preset_save <name>", "save the current inputs as a preset"),
    ("/preset_load <name>", "replace the current inputs with a preset"),
    ("/preset_delete <name>", "delete a preset"),
    ("/suggest", "list smart suggestions for the core prompt"),
    ("/apply <n>", "apply suggestion number n"),
    ("/preview", "show the live preview"),
    ("/conflicts", "show conflicting selections"),
    ("/fields", "list schema fields and current values"),
    ("/presets", "list saved presets"),
    ("/preambles", "list preambles"),
    ("/history", "show recent enhancements"),
    ("/clear", "reset all inputs"),
    ("/generate", "send the composed prompt"),
    ("/deconstruct <path>", "caption an image as scene, subject and style"),
    ("/describe <path>", "turn an image into a prompt"),
    ("/help", "show this list"),
    ("/quit", "leave the console"),
];
