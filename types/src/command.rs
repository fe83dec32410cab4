use std::fmt;

use crate::ids::ProcessId;

/// An instruction requesting exactly one transition on a named process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Move the process into its pre-terminal TERMINATING state, recording `reason`
    /// as the error detail.
    Terminate { process_id: ProcessId, reason: String },
    /// Ask a transfer to wind down normally (COMPLETING).
    Complete { process_id: ProcessId },
}

impl Command {
    #[must_use]
    pub fn terminate(process_id: ProcessId, reason: impl Into<String>) -> Self {
        Command::Terminate {
            process_id,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn complete(process_id: ProcessId) -> Self {
        Command::Complete { process_id }
    }

    #[must_use]
    pub fn process_id(&self) -> &ProcessId {
        match self {
            Command::Terminate { process_id, .. } | Command::Complete { process_id } => process_id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Terminate { .. } => CommandKind::Terminate,
            Command::Complete { .. } => CommandKind::Complete,
        }
    }
}

/// Discriminant of [`Command`], used as the dispatch-table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Terminate,
    Complete,
}

impl CommandKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CommandKind::Terminate => "terminate",
            CommandKind::Complete => "complete",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
