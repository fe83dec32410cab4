use std::fmt::Display;

use thiserror::Error;

use conduit_types::{ProcessBuildError, ProcessId};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored revision no longer matches the one the caller read. Nothing was
    /// written; reload and retry.
    #[error("Process {id} was modified concurrently")]
    Conflict { id: ProcessId },
    /// Another holder owns an unexpired lease on the record.
    #[error("Process {id} is leased by {holder}")]
    Leased { id: ProcessId, holder: String },
    /// A stored row that no longer decodes into a process.
    #[error("Corrupt process record {id}: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: CorruptRecord,
    },
    #[error("Process store failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum CorruptRecord {
    #[error("unknown process type '{0}'")]
    UnknownProcessType(String),
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    #[error("unreadable payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ProcessBuildError),
}

impl StoreError {
    pub(crate) fn backend(context: &str, err: impl Display) -> Self {
        Self::Backend(format!("{context}: {err}"))
    }

    /// Whether reloading and retrying can succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::Leased { .. })
    }
}
