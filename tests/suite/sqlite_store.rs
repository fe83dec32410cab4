//! SQLite persistence tests
//!
//! Commands and pollers running against an on-disk store, re-read through a
//! fresh connection.

use std::path::Path;
use std::sync::Arc;

use conduit_engine::{
    Clock, CommandDispatcher, CommandOutcome, ListenerHub, ManualClock, RecordingDispatcher,
    RemoteMessageDispatcher, StateMachine, StateMachineContext, StateMachineSettings,
};
use conduit_store::{ProcessStore, SqliteProcessStore};
use conduit_types::{Command, ProcessId, TransferState};

use crate::common::process;

fn open(path: &Path) -> Arc<SqliteProcessStore> {
    Arc::new(SqliteProcessStore::open(path, "node-1", 60_000).unwrap())
}

fn commands(store: &Arc<SqliteProcessStore>, now: i64) -> CommandDispatcher {
    CommandDispatcher::with_default_handlers(
        Arc::clone(store) as Arc<dyn ProcessStore>,
        Arc::new(ListenerHub::default()),
        Arc::new(ManualClock::new(now)) as Arc<dyn Clock>,
    )
}

#[test]
fn legal_transition_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processes.db");
    let id = ProcessId::new("test-id").unwrap();

    {
        let store = open(&path);
        let mut seeded = process("test-id", TransferState::Started, 124_123);
        store.save(&mut seeded).unwrap();
        commands(&store, 200_000)
            .dispatch(&Command::terminate(id.clone(), "a reason"))
            .unwrap();
    }

    let reopened = open(&path);
    let stored = reopened.find(&id).unwrap().unwrap();
    assert_eq!(stored.state(), TransferState::Terminating.into());
    assert_eq!(stored.error_detail(), Some("a reason"));
    assert!(stored.updated_at() > 124_123);
    assert_eq!(stored.revision(), 2);
}

#[test]
fn illegal_transition_leaves_the_record_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processes.db");
    let id = ProcessId::new("test-id").unwrap();
    let store = open(&path);
    let mut seeded = process("test-id", TransferState::Requested, 124_123);
    store.save(&mut seeded).unwrap();

    let outcome = commands(&store, 200_000)
        .dispatch(&Command::complete(id.clone()))
        .unwrap();
    assert!(!outcome.is_applied());

    let reopened = open(&path);
    assert_eq!(reopened.find(&id).unwrap().unwrap(), seeded);
}

#[test]
fn pollers_drive_a_persisted_transfer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processes.db");
    let store = open(&path);
    let mut seeded = process("transfer-1", TransferState::Initial, 1_000);
    store.save(&mut seeded).unwrap();

    let dispatcher = Arc::new(RecordingDispatcher::default());
    let machine = StateMachine::transfer(
        StateMachineContext {
            store: Arc::clone(&store) as Arc<dyn ProcessStore>,
            listeners: Arc::new(ListenerHub::default()),
            clock: Arc::new(ManualClock::new(2_000)) as Arc<dyn Clock>,
            dispatcher: Arc::clone(&dispatcher) as Arc<dyn RemoteMessageDispatcher>,
        },
        StateMachineSettings::default(),
    );

    assert_eq!(machine.tick().unwrap(), 2);
    assert_eq!(dispatcher.sent().len(), 1);

    let reopened = open(&path);
    let stored = reopened.find(seeded.id()).unwrap().unwrap();
    assert_eq!(stored.state(), TransferState::Requested.into());
    // Two transitions at the same instant still order strictly.
    assert_eq!(stored.updated_at(), 2_001);

    // Saved records carry no lease, so another instance can pick them up.
    let other = SqliteProcessStore::open(&path, "node-2", 60_000).unwrap();
    let batch = other
        .next_for_state(TransferState::Requested.into(), 10)
        .unwrap();
    assert_eq!(batch.len(), 1);
}

#[test]
fn command_outcome_reports_the_saved_process() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("processes.db"));
    let mut seeded = process("test-id", TransferState::Started, 100);
    store.save(&mut seeded).unwrap();

    let outcome = commands(&store, 500)
        .dispatch(&Command::complete(seeded.id().clone()))
        .unwrap();
    let CommandOutcome::Applied(applied) = outcome else {
        panic!("complete was ignored");
    };
    assert_eq!(applied, store.find(seeded.id()).unwrap().unwrap());
}
