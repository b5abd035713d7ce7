use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use vfx_contracts::chat::{parse_intent, Intent, CONSOLE_HELP};
use vfx_contracts::prompts::display_order;
use vfx_contracts::schema::FieldKind;
use vfx_contracts::session::SessionSeed;
use vfx_contracts::store::KeyValueStore;
use vfx_contracts::tools::{is_exportable, IN_FLIGHT_MARKER};
use vfx_engine::{BackendKind, ConfigOverrides, EngineConfig, EnhancerEngine};

#[derive(Debug, Parser)]
#[command(
    name = "vfx-tools",
    version,
    about = "Prompt enhancer, image deconstructor and image-to-prompt tools"
)]
struct Cli {
    /// JSON key-value store holding preambles, presets and history.
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    /// `labs` or `dryrun`.
    #[arg(long, global = true)]
    backend: Option<String>,
    /// JSON file replacing the built-in conflict table.
    #[arg(long, global = true)]
    conflicts: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List schema fields, or the values of one field.
    Fields { key: Option<String> },
    /// Print the composed prompt without sending it.
    Compose(ComposeArgs),
    /// Compose, send and print the enhanced candidates.
    Enhance(EnhanceArgs),
    /// Caption an image as scene, subject and style.
    Deconstruct(ImageArgs),
    /// Turn an image into a single video prompt.
    ImageToPrompt(ImageArgs),
    #[command(subcommand)]
    Preambles(PreambleCommand),
    #[command(subcommand)]
    Presets(PresetCommand),
    #[command(subcommand)]
    History(HistoryCommand),
    /// Interactive enhancer session.
    Console,
}

#[derive(Debug, Args, Default)]
struct SessionInputs {
    #[arg(long)]
    prompt: Option<String>,
    /// `key=value`; repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    selections: Vec<String>,
    #[arg(long)]
    neg: Option<String>,
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    preamble: Option<String>,
    /// Start from a saved preset; other flags apply on top.
    #[arg(long)]
    preset: Option<String>,
}

#[derive(Debug, Args)]
struct ComposeArgs {
    #[command(flatten)]
    inputs: SessionInputs,
    /// Show the live preview (placeholder for an empty core prompt).
    #[arg(long)]
    display: bool,
}

#[derive(Debug, Args)]
struct EnhanceArgs {
    #[command(flatten)]
    inputs: SessionInputs,
    #[arg(long, default_value_t = 1)]
    candidates: u8,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ImageArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum PreambleCommand {
    List,
    Show { name: String },
    /// Save a custom preamble (or override a built-in) from a file or text.
    Save {
        name: String,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        #[arg(long)]
        text: Option<String>,
    },
    /// Save changes to an existing custom or overridden preamble.
    Edit {
        name: String,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        #[arg(long)]
        text: Option<String>,
    },
    Delete { name: String },
    Select { name: String },
    /// Unified diff of an overridden built-in against its default text.
    Diff { name: String },
}

#[derive(Debug, Subcommand)]
enum PresetCommand {
    List,
    Show {
        name: String,
    },
    Save {
        name: String,
        #[command(flatten)]
        inputs: SessionInputs,
    },
    Delete {
        name: String,
    },
}

#[derive(Debug, Subcommand)]
enum HistoryCommand {
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
    Clear,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("vfx-tools error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let backend = cli
        .backend
        .as_deref()
        .map(str::parse::<BackendKind>)
        .transpose()?;
    let config = EngineConfig::resolve(ConfigOverrides {
        store: cli.store,
        events: cli.events,
        backend,
        conflicts: cli.conflicts,
    })?;
    if let Some(parent) = config.store_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
    }
    let mut engine = EnhancerEngine::from_config(&config)?;
    let mut out = io::stdout().lock();

    match cli.command {
        Command::Fields { key } => print_fields(&engine, key.as_deref(), &mut out)?,
        Command::Compose(args) => {
            open_with_inputs(&mut engine, &args.inputs)?;
            report_advisories(&engine)?;
            let text = if args.display {
                engine.preview()?
            } else {
                engine.submission_prompt()?
            };
            writeln!(out, "{text}")?;
        }
        Command::Enhance(args) => {
            open_with_inputs(&mut engine, &args.inputs)?;
            report_advisories(&engine)?;
            let results = engine.generate(args.candidates)?;
            if args.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&results)?)?;
            } else {
                print_candidates(&results, &mut out)?;
            }
            engine.close_session()?;
        }
        Command::Deconstruct(args) => {
            let report = engine.deconstruct(&args.image)?;
            if args.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            } else {
                for caption in &report.captions {
                    let body = caption
                        .text
                        .as_deref()
                        .or(caption.error.as_deref())
                        .unwrap_or_default();
                    writeln!(out, "{}:\n{body}\n", caption.category.label())?;
                }
            }
            if report.succeeded() == 0 {
                return Ok(1);
            }
        }
        Command::ImageToPrompt(args) => {
            let prompt = engine.image_to_prompt(&args.image)?;
            if args.json {
                writeln!(out, "{}", json!({ "prompt": prompt }))?;
            } else {
                writeln!(out, "{prompt}")?;
            }
        }
        Command::Preambles(command) => run_preambles(&mut engine, command, &mut out)?,
        Command::Presets(command) => run_presets(&mut engine, command, &mut out)?,
        Command::History(HistoryCommand::List { limit }) => {
            print_history(&engine, limit, &mut out)?
        }
        Command::History(HistoryCommand::Clear) => {
            engine.history().clear()?;
            writeln!(out, "History cleared.")?;
        }
        Command::Console => run_console(&mut engine)?,
    }
    Ok(0)
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn parse_assignment(raw: &str) -> Result<(String, String)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("--set expects key=value, got '{raw}'");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("--set expects key=value, got '{raw}'");
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn open_with_inputs<S: KeyValueStore + Clone>(
    engine: &mut EnhancerEngine<S>,
    inputs: &SessionInputs,
) -> Result<()> {
    if let Some(name) = inputs.preamble.as_deref() {
        engine.select_preamble(name)?;
    }
    let selections = inputs
        .selections
        .iter()
        .map(|raw| parse_assignment(raw))
        .collect::<Result<Vec<_>>>()?;
    let seed = SessionSeed {
        image_attached: inputs.image.is_some(),
        ..SessionSeed::default()
    };
    engine.open_session_with_image(&seed, inputs.image.as_deref())?;
    if let Some(name) = inputs.preset.as_deref() {
        engine.load_preset(name)?;
        if let Some(preamble) = inputs.preamble.as_deref() {
            engine.select_preamble(preamble)?;
        }
    }
    if let Some(prompt) = inputs.prompt.as_deref() {
        engine.set_core_prompt(prompt)?;
    }
    if let Some(neg) = inputs.neg.as_deref() {
        engine.set_negative_keywords(neg)?;
    }
    for (key, value) in &selections {
        engine.set_field(key, value)?;
    }
    Ok(())
}

/// Conflicts and missing required fields are advisory; they go to stderr.
fn report_advisories<S: KeyValueStore + Clone>(engine: &EnhancerEngine<S>) -> Result<()> {
    for messages in engine.conflicts()?.values() {
        for message in messages {
            eprintln!("warning: {}", message.message);
        }
    }
    let missing = engine.missing_required_fields()?;
    if !missing.is_empty() {
        eprintln!(
            "warning: preamble '{}' works best with: {}",
            engine.active_preamble()?.name,
            missing.join(", ")
        );
    }
    Ok(())
}

fn print_candidates(results: &[String], out: &mut impl Write) -> Result<()> {
    if results.is_empty() {
        writeln!(out, "No prompts returned.")?;
        return Ok(());
    }
    for (idx, text) in results.iter().enumerate() {
        writeln!(out, "Prompt {}:\n{text}\n", idx + 1)?;
    }
    Ok(())
}

fn print_fields<S: KeyValueStore + Clone>(
    engine: &EnhancerEngine<S>,
    key: Option<&str>,
    out: &mut impl Write,
) -> Result<()> {
    let registry = engine.registry();
    if let Some(key) = key {
        let field = registry.require(key)?;
        writeln!(out, "{} ({})", field.title, field.key)?;
        if !field.description.is_empty() {
            writeln!(out, "{}", field.description)?;
        }
        if field.kind == FieldKind::FreeText {
            writeln!(out, "  <free text>")?;
        }
        for value in &field.domain {
            let marker = if field.is_default(value) { "*" } else { " " };
            writeln!(out, " {marker} {value}")?;
        }
        return Ok(());
    }

    let state = engine.state().ok();
    for field in registry.fields() {
        let current = match state {
            Some(state) => state.value(registry, &field.key).unwrap_or_default(),
            None => field.default.as_str(),
        };
        let modified = state.is_some_and(|state| state.is_modified(&field.key));
        let marker = if modified { "*" } else { " " };
        writeln!(out, "{marker} {:<28} {:<34} {current}", field.key, field.title)?;
    }
    Ok(())
}

fn print_preambles<S: KeyValueStore + Clone>(
    engine: &EnhancerEngine<S>,
    out: &mut impl Write,
) -> Result<()> {
    let map = engine.preambles().effective_preambles()?;
    let active = engine.active_preamble()?.name;
    let mut group = None;
    for entry in display_order(&map) {
        if group != Some(entry.status) {
            writeln!(out, "{}:", entry.status.group_label())?;
            group = Some(entry.status);
        }
        let marker = if entry.name == active { ">" } else { " " };
        writeln!(out, " {marker} {}", entry.name)?;
    }
    Ok(())
}

fn print_history<S: KeyValueStore + Clone>(
    engine: &EnhancerEngine<S>,
    limit: Option<usize>,
    out: &mut impl Write,
) -> Result<()> {
    let entries = engine.history().entries()?;
    if entries.is_empty() {
        writeln!(out, "No history yet.")?;
        return Ok(());
    }
    for entry in entries.iter().take(limit.unwrap_or(entries.len())) {
        writeln!(out, "[{}] {} ({})", entry.ts, entry.preamble, entry.id)?;
        writeln!(out, "  prompt: {}", entry.core_prompt.trim())?;
        for (idx, result) in entry.results.iter().enumerate() {
            writeln!(out, "  {}. {result}", idx + 1)?;
        }
    }
    Ok(())
}

fn run_preambles<S: KeyValueStore + Clone>(
    engine: &mut EnhancerEngine<S>,
    command: PreambleCommand,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        PreambleCommand::List => print_preambles(engine, out)?,
        PreambleCommand::Show { name } => {
            let entry = engine
                .preambles()
                .get(&name)?
                .with_context(|| format!("unknown preamble '{name}'"))?;
            writeln!(out, "{}", entry.text)?;
        }
        PreambleCommand::Save { name, file, text } => {
            let text = preamble_text(file, text, "save")?;
            engine.save_preamble(&name, &text)?;
            writeln!(out, "Saved preamble '{}'.", name.trim())?;
        }
        PreambleCommand::Edit { name, file, text } => {
            let text = preamble_text(file, text, "edit")?;
            engine.update_preamble(&name, &text)?;
            writeln!(out, "Saved changes to '{}'.", name.trim())?;
        }
        PreambleCommand::Delete { name } => {
            let reverting = engine.preambles().is_builtin(name.trim());
            if !engine.delete_preamble(&name)? {
                bail!("no custom preamble named '{name}'");
            }
            if reverting {
                writeln!(out, "Reverted '{}' to its default text.", name.trim())?;
            } else {
                writeln!(out, "Deleted preamble '{}'.", name.trim())?;
            }
        }
        PreambleCommand::Select { name } => {
            engine.select_preamble(&name)?;
            writeln!(out, "Active preamble: {name}")?;
        }
        PreambleCommand::Diff { name } => match engine.preambles().override_diff(&name)? {
            Some(diff) => write!(out, "{diff}")?,
            None => writeln!(out, "'{name}' is not an overridden built-in.")?,
        },
    }
    Ok(())
}

fn run_presets<S: KeyValueStore + Clone>(
    engine: &mut EnhancerEngine<S>,
    command: PresetCommand,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        PresetCommand::List => {
            let names = engine.presets().list()?;
            if names.is_empty() {
                writeln!(out, "No presets saved.")?;
            }
            for name in names {
                writeln!(out, "{name}")?;
            }
        }
        PresetCommand::Show { name } => {
            let preset = engine
                .presets()
                .get(&name)?
                .with_context(|| format!("unknown preset '{name}'"))?;
            writeln!(out, "{}", serde_json::to_string_pretty(&preset)?)?;
        }
        PresetCommand::Save { name, inputs } => {
            open_with_inputs(engine, &inputs)?;
            engine.save_preset(&name)?;
            engine.close_session()?;
            writeln!(out, "Saved preset '{}'.", name.trim())?;
        }
        PresetCommand::Delete { name } => {
            if !engine.delete_preset(&name)? {
                bail!("unknown preset '{name}'");
            }
            writeln!(out, "Deleted preset '{}'.", name.trim())?;
        }
    }
    Ok(())
}

fn preamble_text(file: Option<PathBuf>, text: Option<String>, verb: &str) -> Result<String> {
    match (file, text) {
        (Some(path), _) => read_text(&path),
        (None, Some(text)) => Ok(text),
        (None, None) => bail!("preambles {verb} needs --file or --text"),
    }
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleFlow {
    Continue,
    Quit,
}

fn run_console<S: KeyValueStore + Clone>(engine: &mut EnhancerEngine<S>) -> Result<()> {
    engine.open_session(&SessionSeed::default())?;
    tracing::debug!(
        session = engine.session_id().unwrap_or_default(),
        backend = engine.backend_name(),
        "console session opened"
    );
    println!(
        "Enhancer session started with '{}' ({} backend). Type /help for commands.",
        engine.active_preamble()?.name,
        engine.backend_name()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();
    loop {
        print!("> ");
        stdout.flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        match handle_intent(engine, &intent, &mut stdout) {
            Ok(ConsoleFlow::Quit) => break,
            Ok(ConsoleFlow::Continue) => {}
            Err(err) => println!("Error: {err:#}"),
        }
    }
    engine.close_session()?;
    Ok(())
}

fn required_arg<'a>(intent: &'a Intent, key: &str, usage: &str) -> Result<&'a str> {
    match intent.arg_str(key).filter(|value| !value.trim().is_empty()) {
        Some(value) => Ok(value),
        None => bail!("usage: {usage}"),
    }
}

fn handle_intent<S: KeyValueStore + Clone>(
    engine: &mut EnhancerEngine<S>,
    intent: &Intent,
    out: &mut impl Write,
) -> Result<ConsoleFlow> {
    match intent.action.as_str() {
        "noop" => {}
        "quit" => return Ok(ConsoleFlow::Quit),
        "help" => {
            for (usage, summary) in CONSOLE_HELP {
                writeln!(out, "  {usage:<30} {summary}")?;
            }
        }
        "set_prompt" => {
            engine.set_core_prompt(intent.arg_str("text").unwrap_or_default())?;
            for (idx, suggestion) in engine.suggestions()?.iter().enumerate() {
                writeln!(out, "  suggestion {}: {}", idx + 1, suggestion.label)?;
            }
        }
        "set_negative" => engine.set_negative_keywords(intent.arg_str("text").unwrap_or_default())?,
        "set_field" => {
            let key = required_arg(intent, "key", "/set <key> <value>")?;
            engine.set_field(key, intent.arg_str("value").unwrap_or_default())?;
            for messages in engine.conflicts()?.values() {
                for message in messages {
                    writeln!(out, "  warning: {}", message.message)?;
                }
            }
        }
        "unset_field" => {
            let key = required_arg(intent, "key", "/unset <key>")?;
            engine.registry().require(key)?;
            engine.unset_field(key)?;
        }
        "attach_image" => {
            let path = required_arg(intent, "path", "/image <path>")?;
            let image = engine.attach_image(Path::new(path))?;
            writeln!(out, "Attached {} ({} bytes).", image.mime_type, image.size_bytes())?;
        }
        "detach_image" => {
            engine.detach_image()?;
        }
        "select_preamble" => {
            let name = required_arg(intent, "name", "/preamble <name>")?;
            engine.select_preamble(name)?;
            let missing = engine.missing_required_fields()?;
            if !missing.is_empty() {
                writeln!(out, "  works best with: {}", missing.join(", "))?;
            }
        }
        "save_preamble" => {
            let name = required_arg(intent, "name", "/preamble_save <name> <path>")?;
            let path = required_arg(intent, "path", "/preamble_save <name> <path>")?;
            engine.save_preamble(name, &read_text(Path::new(path))?)?;
            writeln!(out, "Saved preamble '{name}'.")?;
        }
        "update_preamble" => {
            let name = required_arg(intent, "name", "/preamble_edit <name> <path>")?;
            let path = required_arg(intent, "path", "/preamble_edit <name> <path>")?;
            engine.update_preamble(name, &read_text(Path::new(path))?)?;
            writeln!(out, "Saved changes to '{name}'.")?;
        }
        "delete_preamble" => {
            let name = required_arg(intent, "name", "/preamble_delete <name>")?;
            if !engine.delete_preamble(name)? {
                writeln!(out, "No custom preamble named '{name}'.")?;
            }
        }
        "save_preset" => {
            let name = required_arg(intent, "name", "/preset_save <name>")?;
            engine.save_preset(name)?;
            writeln!(out, "Saved preset '{name}'.")?;
        }
        "load_preset" => {
            let name = required_arg(intent, "name", "/preset_load <name>")?;
            engine.load_preset(name)?;
            writeln!(out, "Loaded preset '{name}'.")?;
        }
        "delete_preset" => {
            let name = required_arg(intent, "name", "/preset_delete <name>")?;
            if !engine.delete_preset(name)? {
                writeln!(out, "No preset named '{name}'.")?;
            }
        }
        "suggest" => {
            let suggestions = engine.suggestions()?;
            if suggestions.is_empty() {
                writeln!(out, "No suggestions.")?;
            }
            for (idx, suggestion) in suggestions.iter().enumerate() {
                writeln!(out, "  {}. {}", idx + 1, suggestion.label)?;
            }
        }
        "apply_suggestion" => {
            let Some(position) = intent.arg_u64("index") else {
                bail!("usage: /apply <n>");
            };
            let applied = engine.apply_suggestion(usize::try_from(position)?)?;
            writeln!(out, "Applied {}.", applied.label)?;
        }
        "preview" => writeln!(out, "{}", engine.preview()?)?,
        "conflicts" => {
            let report = engine.conflicts()?;
            if report.is_empty() {
                writeln!(out, "No conflicts.")?;
            }
            for (key, messages) in &report {
                for message in messages {
                    writeln!(out, "  {key}: {}", message.message)?;
                }
            }
        }
        "list_fields" => print_fields(engine, None, out)?,
        "list_presets" => {
            for name in engine.presets().list()? {
                writeln!(out, "  {name}")?;
            }
        }
        "list_preambles" => print_preambles(engine, out)?,
        "history" => print_history(engine, Some(10), out)?,
        "clear" => {
            engine.clear()?;
            writeln!(out, "Cleared.")?;
        }
        "generate" => {
            writeln!(out, "{IN_FLIGHT_MARKER}")?;
            out.flush()?;
            let results = engine.generate(1)?;
            print_candidates(&results, out)?;
        }
        "deconstruct" => {
            let path = required_arg(intent, "path", "/deconstruct <path>")?;
            let report = engine.deconstruct(Path::new(path))?;
            for caption in &report.captions {
                let body = caption
                    .text
                    .as_deref()
                    .or(caption.error.as_deref())
                    .unwrap_or_default();
                let note = if is_exportable(body) { "" } else { " (not exportable)" };
                writeln!(out, "{}{note}:\n{body}", caption.category.label())?;
            }
        }
        "image_to_prompt" => {
            let path = required_arg(intent, "path", "/describe <path>")?;
            writeln!(out, "{}", engine.image_to_prompt(Path::new(path))?)?;
        }
        "unknown" => {
            let command = intent.arg_str("command").unwrap_or_default();
            writeln!(out, "Unknown command /{command}. Type /help for commands.")?;
        }
        other => writeln!(out, "Unhandled action {other}.")?,
    }
    Ok(ConsoleFlow::Continue)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use vfx_contracts::chat::parse_intent;
    use vfx_contracts::session::SessionSeed;
    use vfx_contracts::store::MemoryStore;
    use vfx_engine::{DryrunBackend, EnhancerEngine};

    use super::{
        handle_intent, open_with_inputs, parse_assignment, print_history, run_preambles, Cli,
        ConsoleFlow, PreambleCommand, SessionInputs,
    };

    fn console() -> anyhow::Result<EnhancerEngine<MemoryStore>> {
        let mut engine = EnhancerEngine::new(MemoryStore::new(), Box::new(DryrunBackend));
        engine.open_session(&SessionSeed::default())?;
        Ok(engine)
    }

    fn send(engine: &mut EnhancerEngine<MemoryStore>, line: &str) -> anyhow::Result<String> {
        let mut out = Vec::new();
        handle_intent(engine, &parse_intent(line), &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn assignments_split_on_the_first_equals() -> anyhow::Result<()> {
        assert_eq!(
            parse_assignment("subject_details= a = b ")?,
            ("subject_details".to_string(), "a = b".to_string())
        );
        assert!(parse_assignment("shot_size").is_err());
        assert!(parse_assignment("=Close-Up").is_err());
        Ok(())
    }

    #[test]
    fn one_shot_inputs_build_the_session() -> anyhow::Result<()> {
        let mut engine = EnhancerEngine::new(MemoryStore::new(), Box::new(DryrunBackend));
        let inputs = SessionInputs {
            prompt: Some("a cat".to_string()),
            selections: vec!["shot_size=Close-Up (CU/Face)".to_string()],
            neg: Some("dogs".to_string()),
            preamble: Some("Veo 2 Lexicon Guide".to_string()),
            ..SessionInputs::default()
        };
        open_with_inputs(&mut engine, &inputs)?;

        let prompt = engine.submission_prompt()?;
        assert!(prompt.contains("\n\na cat\n\nShot Size / Framing: Close-Up (CU/Face)"));
        assert!(prompt.ends_with("\n\n--neg dogs"));
        assert_eq!(engine.preambles().selected()?, "Veo 2 Lexicon Guide");
        Ok(())
    }

    #[test]
    fn console_drives_a_session() -> anyhow::Result<()> {
        let mut engine = console()?;
        let reply = send(&mut engine, "they run at sunset")?;
        assert!(reply.contains("suggestion 1: Tracking Shot for 'run' (Movement)"));

        send(&mut engine, "/apply 1")?;
        assert!(engine.state()?.is_modified("camera_movement"));

        let reply = send(&mut engine, "/generate")?;
        assert!(reply.starts_with("Generating...\nPrompt 1:"));
        assert_eq!(engine.history().entries()?.len(), 1);

        send(&mut engine, "/clear")?;
        assert!(engine.state()?.core_prompt.is_empty());
        Ok(())
    }

    #[test]
    fn console_reports_bad_input() -> anyhow::Result<()> {
        let mut engine = console()?;
        assert!(send(&mut engine, "/set shot_size Giant")
            .err()
            .is_some());
        assert!(send(&mut engine, "/unset").is_err());
        let reply = send(&mut engine, "/frobnicate now")?;
        assert_eq!(reply, "Unknown command /frobnicate. Type /help for commands.\n");
        Ok(())
    }

    #[test]
    fn quit_ends_the_console() -> anyhow::Result<()> {
        let mut engine = console()?;
        let mut out = Vec::new();
        assert_eq!(
            handle_intent(&mut engine, &parse_intent("/exit"), &mut out)?,
            ConsoleFlow::Quit
        );
        Ok(())
    }

    #[test]
    fn preamble_diff_keeps_one_change_per_line() -> anyhow::Result<()> {
        let mut engine = console()?;
        engine.save_preamble("Goldie Custom", "Short.\nSecond line.\n")?;
        let mut out = Vec::new();
        run_preambles(
            &mut engine,
            PreambleCommand::Diff {
                name: "Goldie Custom".to_string(),
            },
            &mut out,
        )?;

        let diff = String::from_utf8(out)?;
        assert!(diff.starts_with("--- default\n+++ custom\n@@ "));
        assert!(diff.lines().count() > 4);
        assert!(diff.lines().any(|line| line == "+Short."));
        assert!(diff.lines().any(|line| line == "+Second line."));
        Ok(())
    }

    #[test]
    fn preamble_edit_needs_a_customized_entry() -> anyhow::Result<()> {
        let mut engine = console()?;
        let edit = |text: &str| PreambleCommand::Edit {
            name: "Goldie Custom".to_string(),
            file: None,
            text: Some(text.to_string()),
        };
        let mut out = Vec::new();
        assert!(run_preambles(&mut engine, edit("Edited."), &mut out).is_err());

        engine.save_preamble("Goldie Custom", "Override.")?;
        run_preambles(&mut engine, edit("Edited."), &mut out)?;
        let text = engine.preambles().get("Goldie Custom")?.map(|entry| entry.text);
        assert_eq!(text.as_deref(), Some("Edited."));
        Ok(())
    }

    #[test]
    fn history_shows_the_core_prompt() -> anyhow::Result<()> {
        let mut engine = console()?;
        send(&mut engine, "foggy pier")?;
        send(&mut engine, "/neg boats")?;
        send(&mut engine, "/generate")?;

        let mut out = Vec::new();
        print_history(&engine, None, &mut out)?;
        let listing = String::from_utf8(out)?;
        assert!(listing.contains("\n  prompt: foggy pier\n"));
        assert!(!listing.contains("prompt: --neg"));
        Ok(())
    }
}
