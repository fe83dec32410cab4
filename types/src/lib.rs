//! Core domain types for Conduit.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies:
//! process ids and states, the legal-transition tables, the `Process` entity, commands,
//! validation outcomes and the values exchanged at the protocol-verb surface.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod command;
mod ids;
mod policy;
mod process;
mod protocol;
mod state;
mod violation;

pub use command::{Command, CommandKind};
pub use ids::{EmptyIdError, ProcessId};
pub use policy::is_legal;
pub use process::{IllegalTransition, NewProcess, Process, ProcessBuildError, ProcessRecord};
pub use protocol::{Claims, IntegrityToken, PARTICIPANT_ID_CLAIM, ProtocolResponse, ResponseStatus};
pub use state::{NegotiationState, ProcessState, ProcessType, Role, TransferState};
pub use violation::{ValidationFailure, ValidationResult, Violation, result_from};
