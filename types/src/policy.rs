//! Legal-transition tables for both state machines.
//!
//! Lookups are pure. An illegal edge is not an error here; callers decide whether
//! "illegal" means a silent no-op (local commands) or a protocol rejection.

use crate::state::{NegotiationState, ProcessState, TransferState};

impl NegotiationState {
    /// Terminal states have no outgoing edges.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            NegotiationState::Finalized | NegotiationState::Terminated
        )
    }

    #[must_use]
    pub const fn can_transition_to(self, to: NegotiationState) -> bool {
        use NegotiationState as N;

        if self.is_terminal() {
            return false;
        }
        if matches!(to, N::Terminating | N::Terminated) {
            return true;
        }
        matches!(
            (self, to),
            (N::Initial, N::Requesting)
                | (N::Requesting, N::Requested)
                | (
                    N::Requested,
                    N::Offering | N::Offered | N::Accepted | N::Agreeing | N::Agreed
                )
                | (N::Offering, N::Offered)
                | (
                    N::Offered,
                    N::Requesting | N::Requested | N::Accepting | N::Accepted
                )
                | (N::Accepting, N::Accepted)
                | (N::Accepted, N::Agreeing | N::Agreed)
                | (N::Agreeing, N::Agreed)
                | (N::Agreed, N::Verifying | N::Verified)
                | (N::Verifying, N::Verified)
                | (N::Verified, N::Finalizing | N::Finalized)
                | (N::Finalizing, N::Finalized)
        )
    }
}

impl TransferState {
    /// Terminal states have no outgoing edges.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, TransferState::Completed | TransferState::Terminated)
    }

    #[must_use]
    pub const fn can_transition_to(self, to: TransferState) -> bool {
        use TransferState as T;

        if self.is_terminal() {
            return false;
        }
        if matches!(to, T::Terminating | T::Terminated) {
            return true;
        }
        matches!(
            (self, to),
            (T::Initial, T::Requesting)
                | (T::Requesting, T::Requested)
                | (T::Requested, T::Starting | T::Started)
                | (T::Starting, T::Started)
                | (T::Started, T::Completing | T::Completed)
                | (T::Completing, T::Completed)
        )
    }
}

impl ProcessState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        match self {
            ProcessState::Negotiation(state) => state.is_terminal(),
            ProcessState::Transfer(state) => state.is_terminal(),
        }
    }

    /// Whether `self -> to` is an edge of the transition graph. Edges never cross
    /// process types.
    #[must_use]
    pub const fn can_transition_to(self, to: ProcessState) -> bool {
        match (self, to) {
            (ProcessState::Negotiation(from), ProcessState::Negotiation(to)) => {
                from.can_transition_to(to)
            }
            (ProcessState::Transfer(from), ProcessState::Transfer(to)) => from.can_transition_to(to),
            _ => false,
        }
    }
}

/// Free-function form of [`ProcessState::can_transition_to`].
#[must_use]
pub const fn is_legal(from: ProcessState, to: ProcessState) -> bool {
    from.can_transition_to(to)
}
