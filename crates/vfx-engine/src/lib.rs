mod attachment;
mod backend;
mod config;

use std::path::Path;
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;
use vfx_contracts::events::{EventKind, EventWriter};
use vfx_contracts::prompts::{
    ComposeTarget, PreambleEntry, PreambleStore, PromptComposer, SmartSuggestion, SuggestionTable,
};
use vfx_contracts::schema::{ConflictDetector, ConflictReport, ConflictTable, SchemaRegistry};
use vfx_contracts::session::{SelectionState, SessionClock, SessionSeed, SessionTicket};
use vfx_contracts::store::{JsonFileStore, KeyValueStore, PresetStore, PromptHistory};
use vfx_contracts::tools::{panel, ToolKind};

pub use attachment::ImageAttachment;
pub use backend::{
    default_backend_registry, BackendRegistry, CaptionCategory, DryrunBackend, EnhanceRequest,
    LabsBackend, PromptBackend, MAX_CANDIDATES, MIN_CANDIDATES,
};
pub use config::{BackendKind, ConfigOverrides, EngineConfig, LabsSettings, DEFAULT_STORE_PATH};

/// A composed request waiting for the remote service.
#[derive(Debug, Clone)]
pub struct PendingEnhancement {
    ticket: SessionTicket,
    session_id: String,
    preamble: String,
    core_prompt: String,
    request: EnhanceRequest,
}

impl PendingEnhancement {
    pub fn ticket(&self) -> SessionTicket {
        self.ticket
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    pub fn prompt(&self) -> &str {
        &self.request.prompt
    }

    pub fn candidates(&self) -> u8 {
        self.request.candidates
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(Vec<String>),
    /// The issuing session was closed or replaced before the result came back.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptionResult {
    pub category: CaptionCategory,
    pub text: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeconstructReport {
    pub captions: Vec<CaptionResult>,
}

impl DeconstructReport {
    pub fn get(&self, category: CaptionCategory) -> Option<&CaptionResult> {
        self.captions
            .iter()
            .find(|caption| caption.category == category)
    }

    pub fn succeeded(&self) -> usize {
        self.captions
            .iter()
            .filter(|caption| caption.text.is_some())
            .count()
    }
}

struct ActiveSession {
    id: String,
    ticket: SessionTicket,
    state: SelectionState,
    image: Option<ImageAttachment>,
    events: Option<EventWriter>,
    results: Vec<String>,
}

/// Owns one enhancer session at a time plus the persisted collections it
/// reads and writes.
pub struct EnhancerEngine<S> {
    registry: SchemaRegistry,
    conflicts: ConflictTable,
    suggestions: SuggestionTable,
    preambles: PreambleStore<S>,
    presets: PresetStore<S>,
    history: PromptHistory<S>,
    backend: Box<dyn PromptBackend>,
    events: Option<EventWriter>,
    clock: SessionClock,
    session: Option<ActiveSession>,
}

impl EnhancerEngine<JsonFileStore> {
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let registry = SchemaRegistry::builtin();
        let conflicts = config.conflict_table(&registry)?;
        let mut backends = default_backend_registry(&config.labs)?;
        let available = backends.names().join(", ");
        let backend = backends.take(config.backend.as_str()).with_context(|| {
            format!(
                "backend '{}' is not registered (available: {available})",
                config.backend.as_str()
            )
        })?;
        let events = EventWriter::new(&config.events_path, format!("tools-{}", Uuid::new_v4()));
        tracing::debug!(
            store = %config.store_path.display(),
            events = %config.events_path.display(),
            backend = config.backend.as_str(),
            "engine configured"
        );
        Ok(Self::new(JsonFileStore::new(&config.store_path), backend)
            .with_registry(registry)
            .with_conflicts(conflicts)
            .with_events(events))
    }
}

impl<S: KeyValueStore + Clone> EnhancerEngine<S> {
    pub fn new(store: S, backend: Box<dyn PromptBackend>) -> Self {
        Self {
            registry: SchemaRegistry::builtin(),
            conflicts: ConflictTable::builtin(),
            suggestions: SuggestionTable::builtin(),
            preambles: PreambleStore::new(store.clone()),
            presets: PresetStore::new(store.clone()),
            history: PromptHistory::new(store),
            backend,
            events: None,
            clock: SessionClock::default(),
            session: None,
        }
    }

    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_conflicts(mut self, conflicts: ConflictTable) -> Self {
        self.conflicts = conflicts;
        self
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn preambles(&self) -> &PreambleStore<S> {
        &self.preambles
    }

    pub fn presets(&self) -> &PresetStore<S> {
        &self.presets
    }

    pub fn history(&self) -> &PromptHistory<S> {
        &self.history
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    // -- session lifecycle ---------------------------------------------

    /// Opens a fresh session, replacing any open one. Results still in
    /// flight for the replaced session will be discarded.
    pub fn open_session(&mut self, seed: &SessionSeed) -> Result<SessionTicket> {
        self.open_session_with_image(seed, None)
    }

    /// Opens a session seeded with an already attached image. A seed that
    /// marks an image as attached must come with one.
    pub fn open_session_with_image(
        &mut self,
        seed: &SessionSeed,
        image: Option<&Path>,
    ) -> Result<SessionTicket> {
        let image = image
            .map(|path| ImageAttachment::for_panel(path, panel(ToolKind::Enhancer)))
            .transpose()?;
        if seed.image_attached && image.is_none() {
            bail!("session seed marks an image as attached but no image was supplied");
        }
        let mut state = SelectionState::new(self.preambles.selected()?);
        state.apply_seed(&self.registry, seed)?;
        state.image_attached = image.is_some();
        if self.session.is_some() {
            self.close_session()?;
        }
        let ticket = self.clock.open();
        let id = Uuid::new_v4().to_string();
        let events = self.events.as_ref().map(|writer| writer.for_session(&id));
        let preamble = state.active_preamble.clone();
        self.session = Some(ActiveSession {
            id,
            ticket,
            state,
            image,
            events,
            results: Vec::new(),
        });
        self.emit(EventKind::SessionOpened, json!({ "preamble": preamble }))?;
        Ok(ticket)
    }

    /// Returns `false` when no session was open.
    pub fn close_session(&mut self) -> Result<bool> {
        if self.session.is_none() {
            return Ok(false);
        }
        self.emit(EventKind::SessionClosed, json!({}))?;
        self.clock.close();
        self.session = None;
        Ok(true)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.id.as_str())
    }

    pub fn state(&self) -> Result<&SelectionState> {
        Ok(&self.session()?.state)
    }

    pub fn image(&self) -> Option<&ImageAttachment> {
        self.session.as_ref().and_then(|session| session.image.as_ref())
    }

    pub fn last_results(&self) -> Result<&[String]> {
        Ok(&self.session()?.results)
    }

    // -- inputs --------------------------------------------------------

    pub fn set_core_prompt(&mut self, text: &str) -> Result<()> {
        self.session_mut()?.state.core_prompt = text.to_string();
        Ok(())
    }

    pub fn set_negative_keywords(&mut self, text: &str) -> Result<()> {
        self.session_mut()?.state.negative_keywords = text.to_string();
        Ok(())
    }

    pub fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        let session = self.session.as_mut().context("no enhancer session is open")?;
        session.state.set(&self.registry, key, value)?;
        Ok(())
    }

    pub fn unset_field(&mut self, key: &str) -> Result<bool> {
        Ok(self.session_mut()?.state.unset(key))
    }

    pub fn attach_image(&mut self, path: &Path) -> Result<&ImageAttachment> {
        let image = ImageAttachment::for_panel(path, panel(ToolKind::Enhancer))?;
        let session = self.session_mut()?;
        session.state.image_attached = true;
        let image = session.image.insert(image);
        Ok(&*image)
    }

    pub fn detach_image(&mut self) -> Result<bool> {
        let session = self.session_mut()?;
        session.state.image_attached = false;
        Ok(session.image.take().is_some())
    }

    /// Resets every input of the open session; the active preamble stays.
    pub fn clear(&mut self) -> Result<()> {
        let session = self.session_mut()?;
        session.state.clear();
        session.image = None;
        session.results.clear();
        self.emit(EventKind::SessionCleared, json!({}))
    }

    // -- preambles -----------------------------------------------------

    pub fn select_preamble(&mut self, name: &str) -> Result<()> {
        self.preambles.select(name)?;
        if let Some(session) = self.session.as_mut() {
            session.state.active_preamble = name.to_string();
        }
        Ok(())
    }

    /// The preamble the open session composes with, or the persisted
    /// selection when no session is open.
    pub fn active_preamble(&self) -> Result<PreambleEntry> {
        let name = match self.session.as_ref() {
            Some(session) => session.state.active_preamble.clone(),
            None => self.preambles.selected()?,
        };
        if let Some(entry) = self.preambles.get(&name)? {
            return Ok(entry);
        }
        let fallback = self.preambles.selected()?;
        self.preambles
            .get(&fallback)?
            .with_context(|| format!("no preamble available (wanted '{name}')"))
    }

    /// Saves under `name`: a new custom preamble, or an override when the
    /// name is a built-in.
    pub fn save_preamble(&mut self, name: &str, text: &str) -> Result<()> {
        self.preambles.save_custom_text(name, text)?;
        self.preamble_saved(name)
    }

    /// Saves changes to an existing override or custom preamble in place.
    pub fn update_preamble(&mut self, name: &str, text: &str) -> Result<()> {
        self.preambles.save_changes(name, text)?;
        self.preamble_saved(name)
    }

    fn preamble_saved(&self, name: &str) -> Result<()> {
        let name = name.trim();
        self.emit(
            EventKind::PreambleSaved,
            json!({ "name": name, "builtin": self.preambles.is_builtin(name) }),
        )
    }

    /// Deletes a custom preamble or reverts an override. When the deleted
    /// entry was active, the first built-in becomes active.
    pub fn delete_preamble(&mut self, name: &str) -> Result<bool> {
        let name = name.trim();
        let was_selected = self.preambles.selected()? == name;
        if !self.preambles.delete_custom(name)? {
            return Ok(false);
        }
        if self.preambles.get(name)?.is_none() {
            let fallback = self
                .preambles
                .first_builtin()
                .map(str::to_string)
                .context("no built-in preamble to fall back to")?;
            if was_selected {
                self.preambles.select(&fallback)?;
            }
            if let Some(session) = self.session.as_mut() {
                if session.state.active_preamble == name {
                    tracing::info!(deleted = name, active = %fallback, "active preamble deleted; reassigning");
                    session.state.active_preamble = fallback;
                }
            }
        }
        self.emit(
            EventKind::PreambleDeleted,
            json!({ "name": name, "reverted": self.preambles.is_builtin(name) }),
        )?;
        Ok(true)
    }

    pub fn missing_required_fields(&self) -> Result<Vec<String>> {
        let entry = self.active_preamble()?;
        let state = self.state()?;
        Ok(entry
            .missing_required_fields(&self.registry, &state.selections)
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    // -- derived views -------------------------------------------------

    pub fn preview(&self) -> Result<String> {
        self.compose(ComposeTarget::Display)
    }

    pub fn submission_prompt(&self) -> Result<String> {
        self.compose(ComposeTarget::Submission)
    }

    pub fn conflicts(&self) -> Result<ConflictReport> {
        let state = self.state()?;
        Ok(ConflictDetector::new(&self.registry, &self.conflicts).detect(&state.selections))
    }

    pub fn suggestions(&self) -> Result<Vec<SmartSuggestion>> {
        let state = self.state()?;
        Ok(self
            .suggestions
            .suggest(&state.core_prompt, &state.selections)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Applies the suggestion at `position` (1-based, as listed).
    pub fn apply_suggestion(&mut self, position: usize) -> Result<SmartSuggestion> {
        let suggestions = self.suggestions()?;
        let suggestion = position
            .checked_sub(1)
            .and_then(|idx| suggestions.into_iter().nth(idx))
            .with_context(|| format!("no suggestion number {position}"))?;
        self.set_field(&suggestion.field, &suggestion.value)?;
        Ok(suggestion)
    }

    // -- enhancement ---------------------------------------------------

    pub fn submit(&mut self, candidates: u8) -> Result<PendingEnhancement> {
        if !(MIN_CANDIDATES..=MAX_CANDIDATES).contains(&candidates) {
            bail!("candidate count must be between {MIN_CANDIDATES} and {MAX_CANDIDATES}, got {candidates}");
        }
        let prompt = self.submission_prompt()?;
        let preamble = self.active_preamble()?.name;
        let session = self.session()?;
        if session.state.core_prompt.trim().is_empty() && session.image.is_none() {
            bail!("Please enter a core prompt or attach an image.");
        }
        let pending = PendingEnhancement {
            ticket: session.ticket,
            session_id: session.id.clone(),
            preamble,
            core_prompt: session.state.core_prompt.clone(),
            request: EnhanceRequest {
                prompt,
                candidates,
                image: session.image.clone(),
            },
        };
        self.emit(
            EventKind::PromptSubmitted,
            json!({
                "preamble": pending.preamble,
                "candidates": candidates,
                "image_attached": pending.request.image.is_some(),
                "prompt_chars": pending.request.prompt.chars().count(),
            }),
        )?;
        Ok(pending)
    }

    /// Sends a pending request. Does not touch session state, so it may run
    /// while the session changes underneath it.
    pub fn execute(&self, pending: &PendingEnhancement) -> Result<Vec<String>> {
        self.backend
            .enhance(&pending.request)
            .with_context(|| format!("{} enhancement failed", self.backend_name()))
    }

    pub fn apply_result(
        &mut self,
        pending: PendingEnhancement,
        outcome: Result<Vec<String>>,
    ) -> Result<ApplyOutcome> {
        if !self.clock.is_current(pending.ticket) {
            tracing::warn!(
                session = %pending.session_id,
                generation = pending.ticket.generation(),
                "discarding enhancement result for a closed session"
            );
            if let Some(writer) = self.events.as_ref() {
                writer.for_session(&pending.session_id).record(
                    EventKind::ResultDiscarded,
                    map_object(json!({ "ok": outcome.is_ok() })),
                )?;
            }
            return Ok(ApplyOutcome::Discarded);
        }
        let candidates = outcome?;
        self.history
            .record(
                &pending.preamble,
                &pending.core_prompt,
                pending.prompt(),
                &candidates,
            )?;
        self.session_mut()?.results = candidates.clone();
        self.emit(
            EventKind::ResultApplied,
            json!({ "candidates": candidates.len() }),
        )?;
        Ok(ApplyOutcome::Applied(candidates))
    }

    /// Submit, execute and apply in one step.
    pub fn generate(&mut self, candidates: u8) -> Result<Vec<String>> {
        let pending = self.submit(candidates)?;
        let outcome = self.execute(&pending);
        match self.apply_result(pending, outcome)? {
            ApplyOutcome::Applied(results) => Ok(results),
            ApplyOutcome::Discarded => bail!("session closed before the result arrived"),
        }
    }

    // -- presets -------------------------------------------------------

    pub fn save_preset(&mut self, name: &str) -> Result<()> {
        self.presets.save(name, self.state()?)?;
        self.emit(EventKind::PresetSaved, json!({ "name": name.trim() }))
    }

    /// Replaces the session inputs with a saved preset. The attached image
    /// is kept.
    pub fn load_preset(&mut self, name: &str) -> Result<()> {
        let mut loaded = self
            .presets
            .load(name, &self.registry)?
            .with_context(|| format!("no preset named '{}'", name.trim()))?;
        if self.preambles.get(&loaded.active_preamble)?.is_none() {
            tracing::warn!(preamble = %loaded.active_preamble, "preset preamble no longer exists");
            loaded.active_preamble = self.preambles.selected()?;
        }
        let session = self.session_mut()?;
        loaded.image_attached = session.image.is_some();
        session.state = loaded;
        Ok(())
    }

    pub fn delete_preset(&mut self, name: &str) -> Result<bool> {
        let deleted = self.presets.delete(name)?;
        if deleted {
            self.emit(EventKind::PresetDeleted, json!({ "name": name.trim() }))?;
        }
        Ok(deleted)
    }

    // -- image tools ---------------------------------------------------

    /// Captions the image once per category. Categories succeed or fail
    /// independently.
    pub fn deconstruct(&self, path: &Path) -> Result<DeconstructReport> {
        let image = ImageAttachment::for_panel(path, panel(ToolKind::Deconstructor))?;
        let backend = self.backend.as_ref();
        let captions = thread::scope(|scope| {
            let handles: Vec<_> = CaptionCategory::ALL
                .into_iter()
                .map(|category| {
                    let image = &image;
                    (
                        category,
                        scope.spawn(move || backend.caption(image, category)),
                    )
                })
                .collect();
            handles
                .into_iter()
                .map(|(category, handle)| {
                    let outcome = handle
                        .join()
                        .unwrap_or_else(|_| Err(anyhow!("caption worker panicked")));
                    match outcome {
                        Ok(text) => CaptionResult {
                            category,
                            text: Some(text),
                            error: None,
                        },
                        Err(err) => {
                            tracing::warn!(category = category.label(), error = %format!("{err:#}"), "caption failed");
                            CaptionResult {
                                category,
                                text: None,
                                error: Some(format!("Error: {err:#}")),
                            }
                        }
                    }
                })
                .collect::<Vec<_>>()
        });
        let report = DeconstructReport { captions };
        self.emit(
            EventKind::ToolCompleted,
            json!({
                "tool": "deconstructor",
                "succeeded": report.succeeded(),
                "failed": report.captions.len() - report.succeeded(),
            }),
        )?;
        Ok(report)
    }

    pub fn image_to_prompt(&self, path: &Path) -> Result<String> {
        let image = ImageAttachment::for_panel(path, panel(ToolKind::ImageToPrompt))?;
        let prompt = self
            .backend
            .image_to_prompt(&image)
            .with_context(|| format!("{} image-to-prompt failed", self.backend_name()))?;
        if prompt.trim().is_empty() {
            bail!("No valid prompt in API response.");
        }
        self.emit(
            EventKind::ToolCompleted,
            json!({ "tool": "image_to_prompt", "prompt_chars": prompt.chars().count() }),
        )?;
        Ok(prompt)
    }

    // -- internals -----------------------------------------------------

    fn session(&self) -> Result<&ActiveSession> {
        self.session.as_ref().context("no enhancer session is open")
    }

    fn session_mut(&mut self) -> Result<&mut ActiveSession> {
        self.session.as_mut().context("no enhancer session is open")
    }

    fn compose(&self, target: ComposeTarget) -> Result<String> {
        let preamble = self.active_preamble()?;
        let state = self.state()?;
        Ok(PromptComposer::new(&self.registry).compose_state(target, &preamble.text, state))
    }

    /// Records to the session log when a session is open, else the engine log.
    fn emit(&self, kind: EventKind, payload: Value) -> Result<()> {
        let writer = self
            .session
            .as_ref()
            .and_then(|session| session.events.as_ref())
            .or(self.events.as_ref());
        if let Some(writer) = writer {
            writer.record(kind, map_object(payload))?;
        }
        Ok(())
    }
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
