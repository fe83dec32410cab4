//! Command Dispatch Engine.
//!
//! Every command follows the same path: load the process, ask the handler for the
//! target state, skip silently when the transition is illegal, otherwise mutate,
//! save and notify. Conflicting saves reload and retry a bounded number of times.
//!
//! Handlers live in a table keyed by [`CommandKind`], filled once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use conduit_store::ProcessStore;
use conduit_types::{Command, CommandKind, Process, ProcessState, ProcessType, TransferState};

use crate::clock::Clock;
use crate::error::{CommandError, RegistryError};
use crate::listener::ListenerHub;

/// Conflict retries performed before a command is reported as transient.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The transition was committed and listeners were notified.
    Applied(Process),
    /// The command did not apply to the process's current state. Nothing changed.
    Ignored { state: ProcessState },
}

impl CommandOutcome {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, CommandOutcome::Applied(_))
    }
}

pub trait CommandHandler: Send + Sync {
    fn kind(&self) -> CommandKind;

    /// State the command moves `process` to, or `None` if it never applies to
    /// this kind of process.
    fn target(&self, process: &Process) -> Option<ProcessState>;

    /// Payload effects applied after the transition, before the save.
    fn apply(&self, _command: &Command, _process: &mut Process) {}
}

/// Moves any non-terminal process to TERMINATING and records the reason.
#[derive(Debug, Default)]
pub struct TerminateHandler;

impl CommandHandler for TerminateHandler {
    fn kind(&self) -> CommandKind {
        CommandKind::Terminate
    }

    fn target(&self, process: &Process) -> Option<ProcessState> {
        Some(ProcessState::terminating(process.process_type()))
    }

    fn apply(&self, command: &Command, process: &mut Process) {
        if let Command::Terminate { reason, .. } = command {
            process.set_error_detail(reason.clone());
        }
    }
}

/// Moves a started transfer to COMPLETING.
#[derive(Debug, Default)]
pub struct CompleteHandler;

impl CommandHandler for CompleteHandler {
    fn kind(&self) -> CommandKind {
        CommandKind::Complete
    }

    fn target(&self, process: &Process) -> Option<ProcessState> {
        match process.process_type() {
            ProcessType::Transfer => Some(TransferState::Completing.into()),
            ProcessType::Negotiation => None,
        }
    }
}

pub struct CommandDispatcher {
    store: Arc<dyn ProcessStore>,
    listeners: Arc<ListenerHub>,
    clock: Arc<dyn Clock>,
    handlers: HashMap<CommandKind, Box<dyn CommandHandler>>,
    max_conflict_retries: u32,
}

impl CommandDispatcher {
    /// A dispatcher with no handlers registered.
    pub fn new(
        store: Arc<dyn ProcessStore>,
        listeners: Arc<ListenerHub>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            listeners,
            clock,
            handlers: HashMap::new(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    /// A dispatcher with the built-in terminate and complete handlers.
    pub fn with_default_handlers(
        store: Arc<dyn ProcessStore>,
        listeners: Arc<ListenerHub>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut dispatcher = Self::new(store, listeners, clock);
        dispatcher
            .handlers
            .insert(CommandKind::Terminate, Box::new(TerminateHandler));
        dispatcher
            .handlers
            .insert(CommandKind::Complete, Box::new(CompleteHandler));
        dispatcher
    }

    #[must_use]
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn register(&mut self, handler: Box<dyn CommandHandler>) -> Result<(), RegistryError> {
        let kind = handler.kind();
        if self.handlers.contains_key(&kind) {
            return Err(RegistryError::DuplicateHandler(kind));
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    pub fn dispatch(&self, command: &Command) -> Result<CommandOutcome, CommandError> {
        let kind = command.kind();
        let handler = self
            .handlers
            .get(&kind)
            .ok_or(CommandError::Unhandled(kind))?;
        let id = command.process_id();

        let mut conflicts = 0;
        loop {
            let mut process = self.store.find(id)?.ok_or_else(|| CommandError::NotFound {
                kind: "Process",
                id: id.clone(),
            })?;
            let current = process.state();

            let Some(target) = handler.target(&process) else {
                tracing::debug!(process_id = %id, command = %kind, state = %current, "Command does not apply");
                return Ok(CommandOutcome::Ignored { state: current });
            };
            if process.transition(target, self.clock.now_millis()).is_err() {
                tracing::debug!(
                    process_id = %id,
                    command = %kind,
                    from = %current,
                    to = %target,
                    "Ignoring command: illegal transition"
                );
                return Ok(CommandOutcome::Ignored { state: current });
            }
            handler.apply(command, &mut process);

            match self.store.save(&mut process) {
                Ok(()) => {
                    tracing::info!(process_id = %id, command = %kind, from = %current, to = %target, "Transition committed");
                    self.listeners.notify(&process, target);
                    return Ok(CommandOutcome::Applied(process));
                }
                Err(err) if err.is_retryable() && conflicts < self.max_conflict_retries => {
                    conflicts += 1;
                    tracing::debug!(process_id = %id, command = %kind, attempt = conflicts, error = %err, "Save conflict, reloading");
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!(process_id = %id, command = %kind, error = %err, "Giving up after repeated save conflicts");
                    return Err(CommandError::Transient {
                        command: kind,
                        id: id.clone(),
                        attempts: conflicts + 1,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use conduit_store::{RecordingStore, StoreCall};
    use conduit_types::{NegotiationState, NewProcess, ProcessId, Role};

    use super::*;
    use crate::clock::ManualClock;

    fn transfer(state: TransferState) -> Process {
        Process::new(
            NewProcess {
                id: Some("test-id".to_string()),
                role: Role::Provider,
                state: state.into(),
                correlation_id: None,
                counter_party_id: "consumer".to_string(),
                counter_party_address: "http://consumer".to_string(),
                protocol: "dsp".to_string(),
                payload: json!({}),
            },
            124_123,
        )
        .unwrap()
    }

    fn dispatcher(store: &Arc<RecordingStore>) -> CommandDispatcher {
        CommandDispatcher::with_default_handlers(
            Arc::clone(store) as Arc<dyn ProcessStore>,
            Arc::new(ListenerHub::default()),
            Arc::new(ManualClock::new(200_000)),
        )
    }

    fn id() -> ProcessId {
        ProcessId::new("test-id").unwrap()
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let store = Arc::new(RecordingStore::default());
        let mut dispatcher = dispatcher(&store);
        assert_eq!(
            dispatcher.register(Box::new(TerminateHandler)).unwrap_err(),
            RegistryError::DuplicateHandler(CommandKind::Terminate)
        );
    }

    #[test]
    fn unregistered_kind_is_unhandled() {
        let store = Arc::new(RecordingStore::default());
        store.seed(transfer(TransferState::Started));
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&store) as Arc<dyn ProcessStore>,
            Arc::new(ListenerHub::default()),
            Arc::new(ManualClock::new(0)),
        );
        assert!(matches!(
            dispatcher.dispatch(&Command::complete(id())),
            Err(CommandError::Unhandled(CommandKind::Complete))
        ));
    }

    #[test]
    fn complete_moves_started_transfer_to_completing() {
        let store = Arc::new(RecordingStore::default());
        store.seed(transfer(TransferState::Started));

        let outcome = dispatcher(&store)
            .dispatch(&Command::complete(id()))
            .unwrap();
        let CommandOutcome::Applied(process) = outcome else {
            panic!("expected applied, got {outcome:?}");
        };
        assert_eq!(process.state(), TransferState::Completing.into());
        assert_eq!(process.error_detail(), None);
    }

    #[test]
    fn complete_ignores_negotiations() {
        let store = Arc::new(RecordingStore::default());
        let mut negotiation = transfer(TransferState::Started).to_record();
        negotiation.process_type = ProcessType::Negotiation;
        negotiation.state = NegotiationState::Agreed.code();
        store.seed(Process::restore(negotiation).unwrap());

        let outcome = dispatcher(&store)
            .dispatch(&Command::complete(id()))
            .unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Ignored {
                state: NegotiationState::Agreed.into()
            }
        );
        assert!(store.saves().is_empty());
    }

    #[test]
    fn conflicts_are_retried_then_succeed() {
        let store = Arc::new(RecordingStore::default());
        store.seed(transfer(TransferState::Started));
        store.fail_next_saves(2);

        let outcome = dispatcher(&store)
            .dispatch(&Command::terminate(id(), "operator"))
            .unwrap();
        assert!(outcome.is_applied());
        assert_eq!(store.saves().len(), 3);
        let finds = store
            .calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::Find(_)))
            .count();
        assert_eq!(finds, 3);
    }

    #[test]
    fn persistent_conflicts_surface_as_transient() {
        let store = Arc::new(RecordingStore::default());
        store.seed(transfer(TransferState::Started));
        store.fail_next_saves(10);

        let err = dispatcher(&store)
            .with_max_conflict_retries(1)
            .dispatch(&Command::terminate(id(), "operator"))
            .unwrap_err();
        assert!(matches!(err, CommandError::Transient { attempts: 2, .. }));
        assert!(err.is_transient());
        assert_eq!(
            store.find(&id()).unwrap().unwrap().state(),
            TransferState::Started.into()
        );
    }
}
