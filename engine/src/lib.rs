//! Process lifecycle engine for Conduit.
//!
//! Two call paths mutate processes, and both funnel through the same
//! transition -> save -> notify sequence:
//!
//! - [`CommandDispatcher`] for locally issued commands (terminate, complete).
//!   Illegal transitions are absorbed as no-ops.
//! - [`NegotiationService`] / [`TransferService`] for inbound protocol verbs.
//!   Messages are validated first; illegal transitions become `FATAL_ERROR`.
//!
//! A [`WorkerPool`] of [`StateMachine`] pollers drives processes through the
//! states that need an outbound message, using store leases so concurrent workers
//! never handle the same record twice.
//!
//! Nothing here holds an in-process lock over a process. The store's revision
//! check and leases are the only serialization point.

#![allow(clippy::missing_errors_doc)]

mod clock;
mod command;
mod error;
mod listener;
mod pool;
mod protocol;
mod remote;
mod state_machine;
#[cfg(any(test, feature = "testing"))]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{
    CommandDispatcher, CommandHandler, CommandOutcome, CompleteHandler,
    DEFAULT_MAX_CONFLICT_RETRIES, TerminateHandler,
};
pub use error::{CommandError, DispatchError, InitiateError, ProtocolError, RegistryError};
pub use listener::{DEFAULT_SLOW_THRESHOLD, ListenerError, ListenerHub, ProcessListener};
pub use pool::{DEFAULT_POLL_INTERVAL, WorkerPool};
pub use protocol::{
    DEFAULT_PROTOCOL, Initiation, NegotiationService, NegotiationVerb, ProtocolRequest,
    ProtocolService, ProtocolVerb, TERMINATED_BY_COUNTER_PARTY, TransferService, TransferVerb,
};
pub use remote::{LoggingDispatcher, RemoteMessage, RemoteMessageDispatcher};
pub use state_machine::{
    DEFAULT_BATCH_SIZE, DEFAULT_MAX_SEND_ATTEMPTS, StateMachine, StateMachineContext,
    StateMachineSettings,
};
#[cfg(any(test, feature = "testing"))]
pub use testing::{RecordingDispatcher, RecordingListener};
