use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use vfx_contracts::schema::{ConflictTable, SchemaRegistry};

pub const DEFAULT_STORE_PATH: &str = ".vfx-tools/store.json";
pub const DEFAULT_LABS_BASE_URL: &str = "https://labs.google/fx/api/trpc";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    Labs,
    #[default]
    Dryrun,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Labs => "labs",
            Self::Dryrun => "dryrun",
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "labs" => Ok(Self::Labs),
            "dryrun" | "dry-run" => Ok(Self::Dryrun),
            other => bail!("unknown backend '{other}' (expected labs or dryrun)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabsSettings {
    pub base_url: String,
    pub cookie: Option<String>,
    pub timeout: Duration,
}

impl Default for LabsSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LABS_BASE_URL.to_string(),
            cookie: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl LabsSettings {
    pub fn from_env() -> Result<Self> {
        let timeout_secs = match non_empty_env("VFX_LABS_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("VFX_LABS_TIMEOUT_SECS must be whole seconds, got '{raw}'"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        Ok(Self {
            base_url: non_empty_env("VFX_LABS_BASE_URL")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_LABS_BASE_URL.to_string()),
            cookie: non_empty_env("VFX_LABS_COOKIE"),
            timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }
}

/// Overrides given on the command line; `None` falls through to the
/// environment and then to the defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub store: Option<PathBuf>,
    pub events: Option<PathBuf>,
    pub backend: Option<BackendKind>,
    pub conflicts: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub store_path: PathBuf,
    pub events_path: PathBuf,
    pub backend: BackendKind,
    pub conflicts_path: Option<PathBuf>,
    pub labs: LabsSettings,
}

impl EngineConfig {
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        let store_path = overrides
            .store
            .or_else(|| non_empty_env("VFX_TOOLS_STORE").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));
        let events_path = overrides
            .events
            .or_else(|| non_empty_env("VFX_TOOLS_EVENTS").map(PathBuf::from))
            .unwrap_or_else(|| default_events_path(&store_path));
        let backend = match overrides.backend {
            Some(kind) => kind,
            None => match non_empty_env("VFX_TOOLS_BACKEND") {
                Some(raw) => raw.parse()?,
                None => BackendKind::default(),
            },
        };
        Ok(Self {
            store_path,
            events_path,
            backend,
            conflicts_path: overrides.conflicts,
            labs: LabsSettings::from_env()?,
        })
    }

    /// Fixed paths and the offline backend; ignores the environment.
    pub fn local(store_path: impl Into<PathBuf>) -> Self {
        let store_path = store_path.into();
        Self {
            events_path: default_events_path(&store_path),
            store_path,
            backend: BackendKind::Dryrun,
            conflicts_path: None,
            labs: LabsSettings::default(),
        }
    }

    pub fn conflict_table(&self, registry: &SchemaRegistry) -> Result<ConflictTable> {
        let Some(path) = self.conflicts_path.as_ref() else {
            return Ok(ConflictTable::builtin());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading conflict table {}", path.display()))?;
        let table = ConflictTable::from_json(&raw)
            .with_context(|| format!("conflict table {} is malformed", path.display()))?;
        table
            .validate(registry)
            .with_context(|| format!("conflict table {} names unknown values", path.display()))?;
        Ok(table)
    }
}

fn default_events_path(store_path: &Path) -> PathBuf {
    store_path
        .parent()
        .map(|parent| parent.join("events.jsonl"))
        .unwrap_or_else(|| PathBuf::from("events.jsonl"))
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
