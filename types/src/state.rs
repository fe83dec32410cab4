//! Process roles, process types and the typed state codes of both state machines.
//!
//! State codes are the persisted and logged representation. Gaps between codes are
//! intentional: they leave room for intermediate states without renumbering.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which side of the exchange the local connector plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Consumer,
    Provider,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Consumer => "CONSUMER",
            Role::Provider => "PROVIDER",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CONSUMER" => Some(Role::Consumer),
            "PROVIDER" => Some(Role::Provider),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two kinds of long-running exchange this core drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    Negotiation,
    Transfer,
}

impl ProcessType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProcessType::Negotiation => "negotiation",
            ProcessType::Transfer => "transfer",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "negotiation" => Some(ProcessType::Negotiation),
            "transfer" => Some(ProcessType::Transfer),
            _ => None,
        }
    }

    /// Name used in user-facing messages ("Could not find ContractNegotiation ...").
    #[must_use]
    pub const fn entity_name(self) -> &'static str {
        match self {
            ProcessType::Negotiation => "ContractNegotiation",
            ProcessType::Transfer => "TransferProcess",
        }
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NegotiationState {
    Initial,
    Requesting,
    Requested,
    Offering,
    Offered,
    Accepting,
    Accepted,
    Agreeing,
    Agreed,
    Verifying,
    Verified,
    Finalizing,
    Finalized,
    Terminating,
    Terminated,
}

impl NegotiationState {
    pub const ALL: [NegotiationState; 15] = [
        NegotiationState::Initial,
        NegotiationState::Requesting,
        NegotiationState::Requested,
        NegotiationState::Offering,
        NegotiationState::Offered,
        NegotiationState::Accepting,
        NegotiationState::Accepted,
        NegotiationState::Agreeing,
        NegotiationState::Agreed,
        NegotiationState::Verifying,
        NegotiationState::Verified,
        NegotiationState::Finalizing,
        NegotiationState::Finalized,
        NegotiationState::Terminating,
        NegotiationState::Terminated,
    ];

    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            NegotiationState::Initial => 50,
            NegotiationState::Requesting => 100,
            NegotiationState::Requested => 200,
            NegotiationState::Offering => 300,
            NegotiationState::Offered => 400,
            NegotiationState::Accepting => 700,
            NegotiationState::Accepted => 800,
            NegotiationState::Agreeing => 825,
            NegotiationState::Agreed => 850,
            NegotiationState::Verifying => 1050,
            NegotiationState::Verified => 1100,
            NegotiationState::Finalizing => 1150,
            NegotiationState::Finalized => 1200,
            NegotiationState::Terminating => 1300,
            NegotiationState::Terminated => 1400,
        }
    }

    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.code() == code)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            NegotiationState::Initial => "INITIAL",
            NegotiationState::Requesting => "REQUESTING",
            NegotiationState::Requested => "REQUESTED",
            NegotiationState::Offering => "OFFERING",
            NegotiationState::Offered => "OFFERED",
            NegotiationState::Accepting => "ACCEPTING",
            NegotiationState::Accepted => "ACCEPTED",
            NegotiationState::Agreeing => "AGREEING",
            NegotiationState::Agreed => "AGREED",
            NegotiationState::Verifying => "VERIFYING",
            NegotiationState::Verified => "VERIFIED",
            NegotiationState::Finalizing => "FINALIZING",
            NegotiationState::Finalized => "FINALIZED",
            NegotiationState::Terminating => "TERMINATING",
            NegotiationState::Terminated => "TERMINATED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    Initial,
    Requesting,
    Requested,
    Starting,
    Started,
    Completing,
    Completed,
    Terminating,
    Terminated,
}

impl TransferState {
    pub const ALL: [TransferState; 9] = [
        TransferState::Initial,
        TransferState::Requesting,
        TransferState::Requested,
        TransferState::Starting,
        TransferState::Started,
        TransferState::Completing,
        TransferState::Completed,
        TransferState::Terminating,
        TransferState::Terminated,
    ];

    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            TransferState::Initial => 100,
            TransferState::Requesting => 400,
            TransferState::Requested => 500,
            TransferState::Starting => 550,
            TransferState::Started => 600,
            TransferState::Completing => 700,
            TransferState::Completed => 800,
            TransferState::Terminating => 825,
            TransferState::Terminated => 850,
        }
    }

    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.code() == code)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TransferState::Initial => "INITIAL",
            TransferState::Requesting => "REQUESTING",
            TransferState::Requested => "REQUESTED",
            TransferState::Starting => "STARTING",
            TransferState::Started => "STARTED",
            TransferState::Completing => "COMPLETING",
            TransferState::Completed => "COMPLETED",
            TransferState::Terminating => "TERMINATING",
            TransferState::Terminated => "TERMINATED",
        }
    }
}

/// State of a process, tagged with the state machine it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "state", rename_all = "snake_case")]
pub enum ProcessState {
    Negotiation(NegotiationState),
    Transfer(TransferState),
}

impl ProcessState {
    #[must_use]
    pub const fn process_type(self) -> ProcessType {
        match self {
            ProcessState::Negotiation(_) => ProcessType::Negotiation,
            ProcessState::Transfer(_) => ProcessType::Transfer,
        }
    }

    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            ProcessState::Negotiation(state) => state.code(),
            ProcessState::Transfer(state) => state.code(),
        }
    }

    #[must_use]
    pub fn from_code(process_type: ProcessType, code: i32) -> Option<Self> {
        match process_type {
            ProcessType::Negotiation => NegotiationState::from_code(code).map(Self::Negotiation),
            ProcessType::Transfer => TransferState::from_code(code).map(Self::Transfer),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProcessState::Negotiation(state) => state.as_str(),
            ProcessState::Transfer(state) => state.as_str(),
        }
    }

    /// The pre-terminal state a process enters when it is being shut down.
    #[must_use]
    pub const fn terminating(process_type: ProcessType) -> Self {
        match process_type {
            ProcessType::Negotiation => ProcessState::Negotiation(NegotiationState::Terminating),
            ProcessType::Transfer => ProcessState::Transfer(TransferState::Terminating),
        }
    }

    #[must_use]
    pub const fn terminated(process_type: ProcessType) -> Self {
        match process_type {
            ProcessType::Negotiation => ProcessState::Negotiation(NegotiationState::Terminated),
            ProcessType::Transfer => ProcessState::Transfer(TransferState::Terminated),
        }
    }

    /// Failure-class states: the process is being, or has been, shut down.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(
            self,
            ProcessState::Negotiation(NegotiationState::Terminating | NegotiationState::Terminated)
                | ProcessState::Transfer(TransferState::Terminating | TransferState::Terminated)
        )
    }
}

impl From<NegotiationState> for ProcessState {
    fn from(state: NegotiationState) -> Self {
        ProcessState::Negotiation(state)
    }
}

impl From<TransferState> for ProcessState {
    fn from(state: TransferState) -> Self {
        ProcessState::Transfer(state)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.code())
    }
}
