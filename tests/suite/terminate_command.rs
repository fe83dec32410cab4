//! Terminate command tests

use conduit_engine::{CommandError, CommandOutcome};
use conduit_store::{ProcessStore, StoreCall};
use conduit_types::{Command, NegotiationState, ProcessId, ProcessState, TransferState};

use crate::common::{CommandHarness, process};

fn id(raw: &str) -> ProcessId {
    ProcessId::new(raw).unwrap()
}

#[test]
fn terminal_processes_are_left_untouched() {
    let terminal: [ProcessState; 4] = [
        TransferState::Completed.into(),
        TransferState::Terminated.into(),
        NegotiationState::Finalized.into(),
        NegotiationState::Terminated.into(),
    ];

    for state in terminal {
        let harness = CommandHarness::new(200_000);
        let seeded = harness.store.seed(process("test-id", state, 124_123));

        let outcome = harness
            .commands
            .dispatch(&Command::terminate(id("test-id"), "a reason"))
            .unwrap();

        assert_eq!(outcome, CommandOutcome::Ignored { state });
        let stored = harness.store.find(&id("test-id")).unwrap().unwrap();
        assert_eq!(stored, seeded, "{state} changed");
        assert_eq!(stored.updated_at(), 124_123);
        assert_eq!(stored.error_detail(), None);
        assert!(harness.store.saves().is_empty());
        assert!(harness.listener.events().is_empty());
    }
}

#[test]
fn started_transfer_moves_to_terminating() {
    let harness = CommandHarness::new(200_000);
    harness.store.seed(process("test-id", TransferState::Started, 124_123));

    let outcome = harness
        .commands
        .dispatch(&Command::terminate(id("test-id"), "a reason"))
        .unwrap();
    assert!(outcome.is_applied());

    let saves = harness.store.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].state(), TransferState::Terminating.into());
    assert_eq!(saves[0].error_detail(), Some("a reason"));
    assert_ne!(saves[0].updated_at(), 124_123);

    let stored = harness.store.find(&id("test-id")).unwrap().unwrap();
    assert_eq!(stored.state(), TransferState::Terminating.into());
    assert_eq!(stored.error_detail(), Some("a reason"));
    assert_eq!(stored.updated_at(), 200_000);

    assert_eq!(
        harness.listener.states_for(&id("test-id")),
        vec![TransferState::Terminating.into()]
    );
}

#[test]
fn missing_process_is_not_found() {
    let harness = CommandHarness::new(200_000);

    let err = harness
        .commands
        .dispatch(&Command::terminate(id("test-id"), "a reason"))
        .unwrap_err();

    assert!(matches!(err, CommandError::NotFound { .. }));
    assert!(err.to_string().contains("test-id"));
    assert!(harness.listener.events().is_empty());
    assert!(
        harness
            .store
            .calls()
            .iter()
            .all(|call| matches!(call, StoreCall::Find(_)))
    );
}

#[test]
fn negotiation_in_flight_is_terminated_too() {
    let harness = CommandHarness::new(5_000);
    harness.store.seed(process("neg-1", NegotiationState::Agreed, 1_000));

    harness
        .commands
        .dispatch(&Command::terminate(id("neg-1"), "budget withdrawn"))
        .unwrap();

    let stored = harness.store.find(&id("neg-1")).unwrap().unwrap();
    assert_eq!(stored.state(), NegotiationState::Terminating.into());
    assert_eq!(stored.error_detail(), Some("budget withdrawn"));
}

#[test]
fn conflicting_save_is_retried_on_fresh_state() {
    let harness = CommandHarness::new(200_000);
    harness.store.seed(process("test-id", TransferState::Started, 124_123));
    harness.store.fail_next_saves(1);

    harness
        .commands
        .dispatch(&Command::terminate(id("test-id"), "a reason"))
        .unwrap();

    assert_eq!(harness.store.saves().len(), 2);
    assert_eq!(harness.listener.events().len(), 1);
    let stored = harness.store.find(&id("test-id")).unwrap().unwrap();
    assert_eq!(stored.state(), TransferState::Terminating.into());
}
