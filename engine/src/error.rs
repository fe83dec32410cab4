use thiserror::Error;

use conduit_store::StoreError;
use conduit_types::{CommandKind, ProcessBuildError, ProcessId};
use conduit_validator::MessageType;

#[derive(Debug, Error)]
pub enum CommandError {
    /// The addressed process does not exist. Never retried.
    #[error("Could not find {kind} with ID [{id}]")]
    NotFound { kind: &'static str, id: ProcessId },
    /// Every save attempt collided with a concurrent writer.
    #[error("{command} on {id} abandoned after {attempts} conflicting saves")]
    Transient {
        command: CommandKind,
        id: ProcessId,
        attempts: u32,
    },
    #[error("No handler registered for {0} commands")]
    Unhandled(CommandKind),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CommandError {
    /// Whether re-issuing the same command later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            CommandError::Transient { .. } => true,
            CommandError::Store(err) => err.is_retryable(),
            CommandError::NotFound { .. } | CommandError::Unhandled(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Duplicate handler registered for {0} commands")]
    DuplicateHandler(CommandKind),
}

/// Infrastructure failure while handling a protocol verb.
///
/// Protocol-level rejections are not errors; they are `FATAL_ERROR` responses.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("{verb} on {id} abandoned after {attempts} conflicting saves")]
    Transient {
        verb: &'static str,
        id: ProcessId,
        attempts: u32,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum InitiateError {
    #[error("Invalid process: {0}")]
    Build(#[from] ProcessBuildError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure reported by a [`crate::RemoteMessageDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("{message_type} to {address} was rejected: {detail}")]
    Rejected {
        message_type: MessageType,
        address: String,
        detail: String,
    },
    #[error("Transport failure: {0}")]
    Transport(String),
}
