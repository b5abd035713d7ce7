use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SessionOpened,
    SessionClosed,
    SessionCleared,
    PromptSubmitted,
    ResultApplied,
    ResultDiscarded,
    PreambleSaved,
    PreambleDeleted,
    PresetSaved,
    PresetDeleted,
    ToolCompleted,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionOpened => "session_opened",
            Self::SessionClosed => "session_closed",
            Self::SessionCleared => "session_cleared",
            Self::PromptSubmitted => "prompt_submitted",
            Self::ResultApplied => "result_applied",
            Self::ResultDiscarded => "result_discarded",
            Self::PreambleSaved => "preamble_saved",
            Self::PreambleDeleted => "preamble_deleted",
            Self::PresetSaved => "preset_saved",
            Self::PresetDeleted => "preset_deleted",
            Self::ToolCompleted => "tool_completed",
        }
    }
}

/// Append-only JSONL activity log.
///
/// Every line carries `type`, `session_id` and `ts`; the caller payload is
/// merged last and wins on key collisions. Writers derived with
/// [`EventWriter::for_session`] share the file and its lock.
#[derive(Debug, Clone)]
pub struct EventWriter {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
    session_id: String,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: Arc::new(path.into()),
            lock: Arc::new(Mutex::new(())),
            session_id: session_id.into(),
        }
    }

    pub fn for_session(&self, session_id: impl Into<String>) -> Self {
        Self {
            path: Arc::clone(&self.path),
            lock: Arc::clone(&self.lock),
            session_id: session_id.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn record(&self, kind: EventKind, payload: EventPayload) -> anyhow::Result<Value> {
        self.emit(kind.as_str(), payload)
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        event.extend(payload);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.as_path())?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::Value;

    use super::{EventKind, EventPayload, EventWriter};

    #[test]
    fn record_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs/events.jsonl");
        let writer = EventWriter::new(&path, "session-1");

        let mut payload = EventPayload::new();
        payload.insert("preamble".to_string(), Value::String("Goldie Custom".to_string()));
        let emitted = writer.record(EventKind::PromptSubmitted, payload)?;

        let content = fs::read_to_string(&path)?;
        let parsed: Value = serde_json::from_str(content.lines().next().unwrap_or(""))?;
        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], "prompt_submitted");
        assert_eq!(parsed["session_id"], "session-1");
        assert_eq!(parsed["preamble"], "Goldie Custom");
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn payload_wins_over_default_keys() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"), "session-1");

        let mut payload = EventPayload::new();
        payload.insert("session_id".to_string(), Value::String("other".to_string()));
        let emitted = writer.emit("custom", payload)?;
        assert_eq!(emitted["type"], "custom");
        assert_eq!(emitted["session_id"], "other");
        Ok(())
    }

    #[test]
    fn derived_writers_append_to_the_same_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let first = EventWriter::new(&path, "a");
        let second = first.for_session("b");

        first.record(EventKind::SessionOpened, EventPayload::new())?;
        second.record(EventKind::SessionClosed, EventPayload::new())?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<Value> = content
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["session_id"], "a");
        assert_eq!(lines[1]["type"], "session_closed");
        assert_eq!(lines[1]["session_id"], "b");
        Ok(())
    }
}
