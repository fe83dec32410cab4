//! Negotiation/Transfer Protocol Handlers.
//!
//! One entry point per protocol verb. Each call runs the same pipeline:
//!
//! ```text
//! validate payload -> lookup (correlation id, then local id) -> target state
//!   -> replay check -> legality -> caller claims -> integrity token
//!   -> transition -> save -> notify
//! ```
//!
//! Protocol outcomes are two-valued ([`ProtocolResponse`]): OK when the process
//! advanced or had already advanced, `FATAL_ERROR` for a permanent rejection.
//! Store failures are infrastructure errors and come back as `Err`, so the
//! transport can answer them as retryable.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use conduit_store::{ProcessStore, StoreError};
use conduit_types::{
    Claims, IntegrityToken, NegotiationState, NewProcess, Process, ProcessId, ProcessState,
    ProcessType, ProtocolResponse, Role, TransferState, is_legal,
};
use conduit_validator::vocab::{DSPACE_PROPERTY_CALLBACK_ADDRESS, DSPACE_PROPERTY_REASON};
use conduit_validator::{MessageType, Validator, first_string};

use crate::clock::Clock;
use crate::command::DEFAULT_MAX_CONFLICT_RETRIES;
use crate::error::{InitiateError, ProtocolError};
use crate::listener::ListenerHub;

/// Protocol name stamped on processes created from inbound requests.
pub const DEFAULT_PROTOCOL: &str = "dataspace-protocol-http";

/// One inbound protocol call, as handed over by the transport.
#[derive(Debug, Clone)]
pub struct ProtocolRequest {
    pub claims: Claims,
    pub correlation_id: String,
    pub payload: Value,
    pub integrity_token: IntegrityToken,
}

impl ProtocolRequest {
    /// Request whose token chains `payload` onto `previous`.
    #[must_use]
    pub fn chained(
        claims: Claims,
        correlation_id: impl Into<String>,
        payload: Value,
        previous: Option<&IntegrityToken>,
    ) -> Self {
        let integrity_token = IntegrityToken::compute(previous, &payload);
        Self {
            claims,
            correlation_id: correlation_id.into(),
            payload,
            integrity_token,
        }
    }
}

/// A protocol verb: the message it carries and the state it drives to.
pub trait ProtocolVerb: Copy + fmt::Display + Send + Sync + 'static {
    const PROCESS_TYPE: ProcessType;
    const INITIAL: ProcessState;

    fn as_str(self) -> &'static str;
    fn message_type(self) -> MessageType;
    fn target(self) -> ProcessState;
    /// Whether the verb may create a process when none exists.
    fn is_initiating(self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationVerb {
    Requested,
    Offered,
    Accepted,
    Agreed,
    Verified,
    Finalized,
    Terminated,
}

impl NegotiationVerb {
    pub const ALL: [NegotiationVerb; 7] = [
        NegotiationVerb::Requested,
        NegotiationVerb::Offered,
        NegotiationVerb::Accepted,
        NegotiationVerb::Agreed,
        NegotiationVerb::Verified,
        NegotiationVerb::Finalized,
        NegotiationVerb::Terminated,
    ];

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

impl ProtocolVerb for NegotiationVerb {
    const PROCESS_TYPE: ProcessType = ProcessType::Negotiation;
    const INITIAL: ProcessState = ProcessState::Negotiation(NegotiationState::Initial);

    fn as_str(self) -> &'static str {
        match self {
            NegotiationVerb::Requested => "requested",
            NegotiationVerb::Offered => "offered",
            NegotiationVerb::Accepted => "accepted",
            NegotiationVerb::Agreed => "agreed",
            NegotiationVerb::Verified => "verified",
            NegotiationVerb::Finalized => "finalized",
            NegotiationVerb::Terminated => "terminated",
        }
    }

    fn message_type(self) -> MessageType {
        match self {
            NegotiationVerb::Requested => MessageType::ContractRequest,
            NegotiationVerb::Offered => MessageType::ContractOffer,
            NegotiationVerb::Accepted => MessageType::NegotiationAccepted,
            NegotiationVerb::Agreed => MessageType::ContractAgreement,
            NegotiationVerb::Verified => MessageType::AgreementVerification,
            NegotiationVerb::Finalized => MessageType::NegotiationFinalized,
            NegotiationVerb::Terminated => MessageType::NegotiationTermination,
        }
    }

    fn target(self) -> ProcessState {
        let state = match self {
            NegotiationVerb::Requested => NegotiationState::Requested,
            NegotiationVerb::Offered => NegotiationState::Offered,
            NegotiationVerb::Accepted => NegotiationState::Accepted,
            NegotiationVerb::Agreed => NegotiationState::Agreed,
            NegotiationVerb::Verified => NegotiationState::Verified,
            NegotiationVerb::Finalized => NegotiationState::Finalized,
            NegotiationVerb::Terminated => NegotiationState::Terminated,
        };
        state.into()
    }

    fn is_initiating(self) -> bool {
        self == NegotiationVerb::Requested
    }
}

impl fmt::Display for NegotiationVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferVerb {
    Requested,
    Started,
    Completed,
    Terminated,
}

impl TransferVerb {
    pub const ALL: [TransferVerb; 4] = [
        TransferVerb::Requested,
        TransferVerb::Started,
        TransferVerb::Completed,
        TransferVerb::Terminated,
    ];

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

impl ProtocolVerb for TransferVerb {
    const PROCESS_TYPE: ProcessType = ProcessType::Transfer;
    const INITIAL: ProcessState = ProcessState::Transfer(TransferState::Initial);

    fn as_str(self) -> &'static str {
        match self {
            TransferVerb::Requested => "requested",
            TransferVerb::Started => "started",
            TransferVerb::Completed => "completed",
            TransferVerb::Terminated => "terminated",
        }
    }

    fn message_type(self) -> MessageType {
        match self {
            TransferVerb::Requested => MessageType::TransferRequest,
            TransferVerb::Started => MessageType::TransferStart,
            TransferVerb::Completed => MessageType::TransferCompletion,
            TransferVerb::Terminated => MessageType::TransferTermination,
        }
    }

    fn target(self) -> ProcessState {
        let state = match self {
            TransferVerb::Requested => TransferState::Requested,
            TransferVerb::Started => TransferState::Started,
            TransferVerb::Completed => TransferState::Completed,
            TransferVerb::Terminated => TransferState::Terminated,
        };
        state.into()
    }

    fn is_initiating(self) -> bool {
        self == TransferVerb::Requested
    }
}

impl fmt::Display for TransferVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for a locally initiated (consumer-side) process.
#[derive(Debug, Clone)]
pub struct Initiation {
    pub counter_party_id: String,
    pub counter_party_address: String,
    pub payload: Value,
}

/// Error detail recorded when a failure message carries no reason.
pub const TERMINATED_BY_COUNTER_PARTY: &str = "Terminated by counter-party";

/// The process already sits at `target` or has moved past it. A backward move
/// that is itself an edge (a counter-request) is not a replay.
fn is_replay(current: ProcessState, target: ProcessState) -> bool {
    current == target || (current.code() > target.code() && !is_legal(current, target))
}

/// What the pipeline decided before touching the store.
enum Step {
    Respond(ProtocolResponse),
    Commit {
        process: Process,
        from: Option<ProcessState>,
    },
}

pub type NegotiationService = ProtocolService<NegotiationVerb>;
pub type TransferService = ProtocolService<TransferVerb>;

pub struct ProtocolService<V> {
    store: Arc<dyn ProcessStore>,
    listeners: Arc<ListenerHub>,
    clock: Arc<dyn Clock>,
    protocol: String,
    max_conflict_retries: u32,
    verbs: PhantomData<V>,
}

impl<V: ProtocolVerb> ProtocolService<V> {
    pub fn new(
        store: Arc<dyn ProcessStore>,
        listeners: Arc<ListenerHub>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            listeners,
            clock,
            protocol: DEFAULT_PROTOCOL.to_string(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            verbs: PhantomData,
        }
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    #[must_use]
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// Create a consumer-side process in INITIAL, persist it and notify listeners.
    /// The pollers take it from there.
    pub fn initiate(&self, initiation: Initiation) -> Result<Process, InitiateError> {
        let mut process = Process::new(
            NewProcess {
                id: None,
                role: Role::Consumer,
                state: V::INITIAL,
                correlation_id: None,
                counter_party_id: initiation.counter_party_id,
                counter_party_address: initiation.counter_party_address,
                protocol: self.protocol.clone(),
                payload: initiation.payload,
            },
            self.clock.now_millis(),
        )?;
        self.store.save(&mut process)?;
        tracing::info!(
            process_id = %process.id(),
            process_type = %V::PROCESS_TYPE,
            "Process initiated"
        );
        self.listeners.notify(&process, V::INITIAL);
        Ok(process)
    }

    /// Handle one inbound `verb`.
    pub fn handle(
        &self,
        verb: V,
        request: &ProtocolRequest,
    ) -> Result<ProtocolResponse, ProtocolError> {
        let message_type = verb.message_type();
        if let Err(failure) = message_type.validator().validate(&request.payload) {
            return Ok(reject(
                verb,
                &request.correlation_id,
                format!("Invalid {message_type} message: {}", failure.describe()),
            ));
        }
        if request.correlation_id.trim().is_empty() {
            return Ok(reject(verb, "", "Missing correlation id".to_string()));
        }

        let mut conflicts = 0;
        loop {
            let step = match self.lookup(&request.correlation_id)? {
                Some(process) => self.advance(verb, request, process),
                None if verb.is_initiating() => self.create(verb, request),
                None => Step::Respond(reject(
                    verb,
                    &request.correlation_id,
                    format!(
                        "No {} found for {}",
                        V::PROCESS_TYPE.entity_name(),
                        request.correlation_id
                    ),
                )),
            };

            let (mut process, from) = match step {
                Step::Respond(response) => return Ok(response),
                Step::Commit { process, from } => (process, from),
            };
            let to = process.state();
            let from_label = from.map_or_else(|| "-".to_string(), |state| state.to_string());

            match self.store.save(&mut process) {
                Ok(()) => {
                    tracing::info!(
                        process_id = %process.id(),
                        verb = %verb,
                        from = %from_label,
                        to = %to,
                        "Transition committed"
                    );
                    self.listeners.notify(&process, to);
                    return Ok(ProtocolResponse::ok());
                }
                Err(err) if err.is_retryable() && conflicts < self.max_conflict_retries => {
                    conflicts += 1;
                    tracing::debug!(process_id = %process.id(), verb = %verb, attempt = conflicts, error = %err, "Save conflict, reloading");
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!(process_id = %process.id(), verb = %verb, error = %err, "Giving up after repeated save conflicts");
                    return Err(ProtocolError::Transient {
                        verb: verb.as_str(),
                        id: process.id().clone(),
                        attempts: conflicts + 1,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Peers address our processes either by the correlation id we stored for
    /// them or by our local id.
    fn lookup(&self, correlation_id: &str) -> Result<Option<Process>, StoreError> {
        if let Some(process) = self.store.find_by_correlation_id(correlation_id)? {
            return Ok(Some(process));
        }
        match ProcessId::new(correlation_id) {
            Ok(id) => self.store.find(&id),
            Err(_) => Ok(None),
        }
    }

    fn advance(&self, verb: V, request: &ProtocolRequest, mut process: Process) -> Step {
        let target = verb.target();
        let current = process.state();
        let id = process.id().as_str().to_string();

        if current.process_type() != target.process_type() {
            return Step::Respond(reject(
                verb,
                &id,
                format!("{id} is not a {}", V::PROCESS_TYPE.entity_name()),
            ));
        }
        if is_replay(current, target) {
            tracing::debug!(process_id = %id, verb = %verb, state = %current, "Replayed message, already advanced");
            return Step::Respond(ProtocolResponse::ok());
        }
        if !is_legal(current, target) {
            return Step::Respond(reject(
                verb,
                &id,
                format!("Cannot transition from {current} to {target}"),
            ));
        }
        if request.claims.participant_id() != Some(process.counter_party_id()) {
            return Step::Respond(reject(
                verb,
                &id,
                "Caller is not the counter-party of this process".to_string(),
            ));
        }
        let expected = IntegrityToken::compute(process.integrity_token(), &request.payload);
        if expected != request.integrity_token {
            return Step::Respond(reject(verb, &id, "Integrity token mismatch".to_string()));
        }

        if let Err(err) = process.transition(target, self.clock.now_millis()) {
            return Step::Respond(reject(verb, &id, err.to_string()));
        }
        process.set_integrity_token(expected);
        if target.is_failure() {
            let reason = first_string(&request.payload, DSPACE_PROPERTY_REASON)
                .unwrap_or(TERMINATED_BY_COUNTER_PARTY);
            process.set_error_detail(reason);
        }
        Step::Commit {
            process,
            from: Some(current),
        }
    }

    fn create(&self, verb: V, request: &ProtocolRequest) -> Step {
        let correlation_id = request.correlation_id.as_str();
        let Some(participant) = request.claims.participant_id() else {
            return Step::Respond(reject(
                verb,
                correlation_id,
                "Caller has no participant id claim".to_string(),
            ));
        };
        let expected = IntegrityToken::compute(None, &request.payload);
        if expected != request.integrity_token {
            return Step::Respond(reject(
                verb,
                correlation_id,
                "Integrity token mismatch".to_string(),
            ));
        }
        let callback =
            first_string(&request.payload, DSPACE_PROPERTY_CALLBACK_ADDRESS).unwrap_or_default();

        let built = Process::new(
            NewProcess {
                id: None,
                role: Role::Provider,
                state: verb.target(),
                correlation_id: Some(correlation_id.to_string()),
                counter_party_id: participant.to_string(),
                counter_party_address: callback.to_string(),
                protocol: self.protocol.clone(),
                payload: request.payload.clone(),
            },
            self.clock.now_millis(),
        );
        match built {
            Ok(mut process) => {
                process.set_integrity_token(expected);
                Step::Commit {
                    process,
                    from: None,
                }
            }
            Err(err) => Step::Respond(reject(verb, correlation_id, err.to_string())),
        }
    }
}

impl ProtocolService<NegotiationVerb> {
    pub fn requested(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, ProtocolError> {
        self.handle(NegotiationVerb::Requested, request)
    }

    pub fn offered(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, ProtocolError> {
        self.handle(NegotiationVerb::Offered, request)
    }

    pub fn accepted(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, ProtocolError> {
        self.handle(NegotiationVerb::Accepted, request)
    }

    pub fn agreed(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, ProtocolError> {
        self.handle(NegotiationVerb::Agreed, request)
    }

    pub fn verified(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, ProtocolError> {
        self.handle(NegotiationVerb::Verified, request)
    }

    pub fn finalized(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, ProtocolError> {
        self.handle(NegotiationVerb::Finalized, request)
    }

    pub fn terminated(
        &self,
        request: &ProtocolRequest,
    ) -> Result<ProtocolResponse, ProtocolError> {
        self.handle(NegotiationVerb::Terminated, request)
    }
}

impl ProtocolService<TransferVerb> {
    pub fn requested(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, ProtocolError> {
        self.handle(TransferVerb::Requested, request)
    }

    pub fn started(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, ProtocolError> {
        self.handle(TransferVerb::Started, request)
    }

    pub fn completed(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, ProtocolError> {
        self.handle(TransferVerb::Completed, request)
    }

    pub fn terminated(
        &self,
        request: &ProtocolRequest,
    ) -> Result<ProtocolResponse, ProtocolError> {
        self.handle(TransferVerb::Terminated, request)
    }
}

fn reject(verb: impl fmt::Display, process: &str, detail: String) -> ProtocolResponse {
    tracing::warn!(verb = %verb, process = process, detail = %detail, "Protocol message rejected");
    ProtocolResponse::fatal(detail)
}
