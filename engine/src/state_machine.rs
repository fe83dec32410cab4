//! Polling progression of processes in locally driven states.
//!
//! A [`StateMachine`] watches a fixed list of states. Each [`StateMachine::tick`]
//! leases a batch per watched state from the store and runs the state's processor
//! on every leased record. The store lease is the only thing that keeps two
//! workers off the same record.

use std::sync::Arc;

use conduit_store::{ProcessStore, StoreError};
use conduit_types::{NegotiationState, Process, ProcessState, ProcessType, Role, TransferState};
use conduit_validator::MessageType;

use crate::clock::Clock;
use crate::listener::ListenerHub;
use crate::remote::{RemoteMessage, RemoteMessageDispatcher};

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_MAX_SEND_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    /// Move on without talking to the peer.
    Advance(ProcessState),
    /// Send `message`; move to `then` once the peer acknowledged it.
    Send {
        message: MessageType,
        then: ProcessState,
    },
}

#[derive(Debug, Clone, Copy)]
struct Processor {
    state: ProcessState,
    /// `None` applies to both roles.
    role: Option<Role>,
    action: Action,
}

impl Processor {
    fn advance(state: impl Into<ProcessState>, role: Role, to: impl Into<ProcessState>) -> Self {
        Self {
            state: state.into(),
            role: Some(role),
            action: Action::Advance(to.into()),
        }
    }

    fn send(
        state: impl Into<ProcessState>,
        role: Option<Role>,
        message: MessageType,
        then: impl Into<ProcessState>,
    ) -> Self {
        Self {
            state: state.into(),
            role,
            action: Action::Send {
                message,
                then: then.into(),
            },
        }
    }

    fn applies_to(&self, process: &Process) -> bool {
        self.role.is_none_or(|role| role == process.role())
    }
}

fn negotiation_processors() -> Vec<Processor> {
    use NegotiationState as N;
    use Role::{Consumer, Provider};

    vec![
        Processor::advance(N::Initial, Consumer, N::Requesting),
        Processor::send(
            N::Requesting,
            Some(Consumer),
            MessageType::ContractRequest,
            N::Requested,
        ),
        Processor::advance(N::Requested, Provider, N::Agreeing),
        Processor::send(
            N::Offering,
            Some(Provider),
            MessageType::ContractOffer,
            N::Offered,
        ),
        Processor::send(
            N::Accepting,
            Some(Consumer),
            MessageType::NegotiationAccepted,
            N::Accepted,
        ),
        Processor::send(
            N::Agreeing,
            Some(Provider),
            MessageType::ContractAgreement,
            N::Agreed,
        ),
        Processor::advance(N::Agreed, Consumer, N::Verifying),
        Processor::send(
            N::Verifying,
            Some(Consumer),
            MessageType::AgreementVerification,
            N::Verified,
        ),
        Processor::advance(N::Verified, Provider, N::Finalizing),
        Processor::send(
            N::Finalizing,
            Some(Provider),
            MessageType::NegotiationFinalized,
            N::Finalized,
        ),
        Processor::send(
            N::Terminating,
            None,
            MessageType::NegotiationTermination,
            N::Terminated,
        ),
    ]
}

fn transfer_processors() -> Vec<Processor> {
    use Role::{Consumer, Provider};
    use TransferState as T;

    vec![
        Processor::advance(T::Initial, Consumer, T::Requesting),
        Processor::send(
            T::Requesting,
            Some(Consumer),
            MessageType::TransferRequest,
            T::Requested,
        ),
        Processor::advance(T::Requested, Provider, T::Starting),
        Processor::send(
            T::Starting,
            Some(Provider),
            MessageType::TransferStart,
            T::Started,
        ),
        Processor::send(
            T::Completing,
            None,
            MessageType::TransferCompletion,
            T::Completed,
        ),
        Processor::send(
            T::Terminating,
            None,
            MessageType::TransferTermination,
            T::Terminated,
        ),
    ]
}

/// Shared collaborators of every state machine.
#[derive(Clone)]
pub struct StateMachineContext {
    pub store: Arc<dyn ProcessStore>,
    pub listeners: Arc<ListenerHub>,
    pub clock: Arc<dyn Clock>,
    pub dispatcher: Arc<dyn RemoteMessageDispatcher>,
}

#[derive(Debug, Clone, Copy)]
pub struct StateMachineSettings {
    pub batch_size: usize,
    pub max_send_attempts: u32,
}

impl Default for StateMachineSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_send_attempts: DEFAULT_MAX_SEND_ATTEMPTS,
        }
    }
}

pub struct StateMachine {
    process_type: ProcessType,
    context: StateMachineContext,
    settings: StateMachineSettings,
    processors: Vec<Processor>,
}

impl StateMachine {
    #[must_use]
    pub fn negotiation(context: StateMachineContext, settings: StateMachineSettings) -> Self {
        Self {
            process_type: ProcessType::Negotiation,
            context,
            settings,
            processors: negotiation_processors(),
        }
    }

    #[must_use]
    pub fn transfer(context: StateMachineContext, settings: StateMachineSettings) -> Self {
        Self {
            process_type: ProcessType::Transfer,
            context,
            settings,
            processors: transfer_processors(),
        }
    }

    #[must_use]
    pub fn process_type(&self) -> ProcessType {
        self.process_type
    }

    /// States this machine leases from, in processing order.
    #[must_use]
    pub fn watched_states(&self) -> Vec<ProcessState> {
        self.processors.iter().map(|p| p.state).collect()
    }

    /// Run one polling round. Returns the number of processes acted on.
    ///
    /// Per-process failures are logged and do not stop the round; only failing to
    /// lease a batch is returned as an error.
    pub fn tick(&self) -> Result<usize, StoreError> {
        let mut processed = 0;
        for processor in &self.processors {
            let batch = self
                .context
                .store
                .next_for_state(processor.state, self.settings.batch_size)?;
            for process in batch {
                if !processor.applies_to(&process) {
                    self.release(&process);
                    continue;
                }
                self.run(processor.action, process);
                processed += 1;
            }
        }
        Ok(processed)
    }

    fn release(&self, process: &Process) {
        if let Err(err) = self.context.store.release_lease(process.id()) {
            tracing::warn!(process_id = %process.id(), error = %err, "Failed to release lease");
        }
    }

    fn run(&self, action: Action, mut process: Process) {
        let now = self.context.clock.now_millis();
        match action {
            Action::Advance(to) => self.commit(process, to, now),
            Action::Send { message, then } => {
                let outbound = RemoteMessage::for_process(message, &process);
                match self.context.dispatcher.dispatch(&outbound) {
                    Ok(()) => self.commit(process, then, now),
                    Err(err) => {
                        let attempts = process.state_count() + 1;
                        if attempts < self.settings.max_send_attempts {
                            tracing::debug!(
                                process_id = %process.id(),
                                message_type = %message,
                                attempts,
                                error = %err,
                                "Send failed, will retry"
                            );
                            process.record_failed_attempt(now);
                            self.save(&mut process);
                            return;
                        }

                        tracing::warn!(
                            process_id = %process.id(),
                            message_type = %message,
                            attempts,
                            error = %err,
                            "Send failed permanently"
                        );
                        let terminating = ProcessState::terminating(self.process_type);
                        let to = if process.state() == terminating {
                            ProcessState::terminated(self.process_type)
                        } else {
                            process.set_error_detail(format!(
                                "Failed to send {message} after {attempts} attempts: {err}"
                            ));
                            terminating
                        };
                        self.commit(process, to, now);
                    }
                }
            }
        }
    }

    fn commit(&self, mut process: Process, to: ProcessState, now: i64) {
        let from = process.state();
        if let Err(err) = process.transition(to, now) {
            tracing::warn!(process_id = %process.id(), error = %err, "Processor produced an illegal transition");
            self.release(&process);
            return;
        }
        if self.save(&mut process) {
            tracing::info!(process_id = %process.id(), from = %from, to = %to, "Transition committed");
            self.context.listeners.notify(&process, to);
        }
    }

    /// Persist `process`. Either way our lease is gone afterwards: a successful
    /// save clears it and a failed one releases it.
    fn save(&self, process: &mut Process) -> bool {
        let err = match self.context.store.save(process) {
            Ok(()) => return true,
            Err(err) => err,
        };
        if matches!(err, StoreError::Conflict { .. }) {
            tracing::debug!(process_id = %process.id(), error = %err, "Process changed while leased, skipping");
        } else {
            tracing::warn!(process_id = %process.id(), error = %err, "Failed to save process");
        }
        self.release(process);
        false
    }
}
