use std::path::PathBuf;

use thiserror::Error;

pub type StudioResult<T> = std::result::Result<T, StudioError>;

/// Failures surfaced by the composition core.
///
/// Lookups that callers routinely try (`get`, `load`, `delete`) return
/// `Option`/`bool` instead of `NotFound`; the variant is reserved for
/// operations that require their target to exist.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("{0}")]
    Validation(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl StudioError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage file {} could not be accessed", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("value for '{key}' could not be encoded")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("write to '{key}' rejected: {reason}")]
    Rejected { key: String, reason: String },
}
