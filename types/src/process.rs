//! The process entity: one in-flight negotiation or transfer.
//!
//! Fields are private. `state`, `updated_at` and `state_count` change only through
//! [`Process::transition`] and [`Process::record_failed_attempt`], both of which
//! guarantee that `updated_at` strictly increases.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ids::ProcessId;
use crate::protocol::IntegrityToken;
use crate::state::{ProcessState, ProcessType, Role};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessBuildError {
    #[error("process id must not be empty")]
    EmptyId,
    #[error("counter-party address must not be empty")]
    EmptyCounterPartyAddress,
    #[error("protocol must not be empty")]
    EmptyProtocol,
    #[error("unknown state code {code} for {process_type} process")]
    UnknownState {
        process_type: ProcessType,
        code: i32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: ProcessState,
    pub to: ProcessState,
}

/// Input for [`Process::new`].
#[derive(Debug, Clone)]
pub struct NewProcess {
    /// `None` generates a random id.
    pub id: Option<String>,
    pub role: Role,
    pub state: ProcessState,
    pub correlation_id: Option<String>,
    pub counter_party_id: String,
    pub counter_party_address: String,
    pub protocol: String,
    pub payload: Value,
}

/// Persisted shape of a process. Stores read and write this; everything else
/// works on [`Process`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub id: String,
    pub process_type: ProcessType,
    pub role: Role,
    pub state: i32,
    pub state_count: u32,
    pub created_at: i64,
    pub updated_at: i64,
    pub error_detail: Option<String>,
    pub correlation_id: Option<String>,
    pub counter_party_id: String,
    pub counter_party_address: String,
    pub protocol: String,
    pub payload: Value,
    pub integrity_token: Option<String>,
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Process {
    id: ProcessId,
    role: Role,
    state: ProcessState,
    state_count: u32,
    created_at: i64,
    updated_at: i64,
    error_detail: Option<String>,
    correlation_id: Option<String>,
    counter_party_id: String,
    counter_party_address: String,
    protocol: String,
    payload: Value,
    integrity_token: Option<IntegrityToken>,
    revision: u64,
}

impl Process {
    /// Create a new, not yet persisted process.
    pub fn new(new: NewProcess, created_at: i64) -> Result<Self, ProcessBuildError> {
        let id = match new.id {
            Some(id) => ProcessId::new(id).map_err(|_| ProcessBuildError::EmptyId)?,
            None => ProcessId::generate(),
        };
        if new.counter_party_address.trim().is_empty() {
            return Err(ProcessBuildError::EmptyCounterPartyAddress);
        }
        if new.protocol.trim().is_empty() {
            return Err(ProcessBuildError::EmptyProtocol);
        }
        Ok(Self {
            id,
            role: new.role,
            state: new.state,
            state_count: 0,
            created_at,
            updated_at: created_at,
            error_detail: None,
            correlation_id: new.correlation_id.filter(|c| !c.is_empty()),
            counter_party_id: new.counter_party_id,
            counter_party_address: new.counter_party_address,
            protocol: new.protocol,
            payload: new.payload,
            integrity_token: None,
            revision: 0,
        })
    }

    /// Rebuild a process from its persisted shape.
    pub fn restore(record: ProcessRecord) -> Result<Self, ProcessBuildError> {
        let id = ProcessId::new(record.id).map_err(|_| ProcessBuildError::EmptyId)?;
        let state = ProcessState::from_code(record.process_type, record.state).ok_or(
            ProcessBuildError::UnknownState {
                process_type: record.process_type,
                code: record.state,
            },
        )?;
        Ok(Self {
            id,
            role: record.role,
            state,
            state_count: record.state_count,
            created_at: record.created_at,
            updated_at: record.updated_at,
            error_detail: record.error_detail,
            correlation_id: record.correlation_id,
            counter_party_id: record.counter_party_id,
            counter_party_address: record.counter_party_address,
            protocol: record.protocol,
            payload: record.payload,
            integrity_token: record.integrity_token.map(IntegrityToken::from_hex),
            revision: record.revision,
        })
    }

    #[must_use]
    pub fn to_record(&self) -> ProcessRecord {
        ProcessRecord {
            id: self.id.as_str().to_string(),
            process_type: self.process_type(),
            role: self.role,
            state: self.state.code(),
            state_count: self.state_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
            error_detail: self.error_detail.clone(),
            correlation_id: self.correlation_id.clone(),
            counter_party_id: self.counter_party_id.clone(),
            counter_party_address: self.counter_party_address.clone(),
            protocol: self.protocol.clone(),
            payload: self.payload.clone(),
            integrity_token: self
                .integrity_token
                .as_ref()
                .map(|t| t.as_str().to_string()),
            revision: self.revision,
        }
    }

    #[must_use]
    pub fn id(&self) -> &ProcessId {
        &self.id
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn process_type(&self) -> ProcessType {
        self.state.process_type()
    }

    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Attempts made in the current state (failed sends).
    #[must_use]
    pub fn state_count(&self) -> u32 {
        self.state_count
    }

    #[must_use]
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    #[must_use]
    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    #[must_use]
    pub fn counter_party_id(&self) -> &str {
        &self.counter_party_id
    }

    #[must_use]
    pub fn counter_party_address(&self) -> &str {
        &self.counter_party_address
    }

    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    #[must_use]
    pub fn integrity_token(&self) -> Option<&IntegrityToken> {
        self.integrity_token.as_ref()
    }

    /// Optimistic-concurrency revision, maintained by the store.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Move to `to` if the transition table allows it.
    ///
    /// `updated_at` becomes `max(now, updated_at + 1)` and `state_count` resets.
    pub fn transition(&mut self, to: ProcessState, now: i64) -> Result<(), IllegalTransition> {
        if !self.state.can_transition_to(to) {
            return Err(IllegalTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        self.state_count = 0;
        self.touch(now);
        Ok(())
    }

    /// Count a failed attempt in the current state without changing it.
    pub fn record_failed_attempt(&mut self, now: i64) {
        self.state_count = self.state_count.saturating_add(1);
        self.touch(now);
    }

    pub fn set_error_detail(&mut self, detail: impl Into<String>) {
        self.error_detail = Some(detail.into());
    }

    pub fn set_integrity_token(&mut self, token: IntegrityToken) {
        self.integrity_token = Some(token);
    }

    /// Set by the store after a successful write.
    pub fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }

    fn touch(&mut self, now: i64) {
        self.updated_at = now.max(self.updated_at.saturating_add(1));
    }
}
