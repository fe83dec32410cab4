//! Consumer/provider transfer tests

use serde_json::json;

use conduit_engine::{CommandOutcome, Initiation, ProtocolRequest, TERMINATED_BY_COUNTER_PARTY};
use conduit_types::{Claims, Command, Process, TransferState};
use conduit_validator::vocab::{DSPACE_TYPE_TRANSFER_TERMINATION_MESSAGE, TYPE};

use crate::common::{Node, connected_nodes, transfer_payload};

fn initiate(consumer: &Node, provider: &Node) -> Process {
    consumer
        .transfers
        .initiate(Initiation {
            counter_party_id: provider.participant_id.clone(),
            counter_party_address: provider.address.clone(),
            payload: transfer_payload(&consumer.address),
        })
        .unwrap()
}

#[test]
fn transfer_is_started_then_completed_by_the_consumer() {
    let (consumer, provider) = connected_nodes();
    let requested = initiate(&consumer, &provider);

    consumer.transfer_machine.tick().unwrap();
    let shared = provider.lookup(requested.id().as_str()).expect("provider side created");
    assert_eq!(shared.state(), TransferState::Requested.into());
    assert_eq!(
        consumer.get(requested.id()).state(),
        TransferState::Requested.into()
    );

    provider.transfer_machine.tick().unwrap();
    assert_eq!(provider.get(shared.id()).state(), TransferState::Started.into());
    assert_eq!(
        consumer.get(requested.id()).state(),
        TransferState::Started.into()
    );

    consumer.clock.advance(10);
    let outcome = consumer
        .commands
        .dispatch(&Command::complete(requested.id().clone()))
        .unwrap();
    let CommandOutcome::Applied(completing) = outcome else {
        panic!("complete was ignored");
    };
    assert_eq!(completing.state(), TransferState::Completing.into());
    assert_eq!(completing.updated_at(), 1_010);

    consumer.transfer_machine.tick().unwrap();
    assert_eq!(
        consumer.get(requested.id()).state(),
        TransferState::Completed.into()
    );
    assert_eq!(provider.get(shared.id()).state(), TransferState::Completed.into());
}

#[test]
fn complete_before_start_is_ignored() {
    let (consumer, provider) = connected_nodes();
    let requested = initiate(&consumer, &provider);
    consumer.transfer_machine.tick().unwrap();
    let before = consumer.get(requested.id());

    let outcome = consumer
        .commands
        .dispatch(&Command::complete(requested.id().clone()))
        .unwrap();

    assert_eq!(
        outcome,
        CommandOutcome::Ignored {
            state: TransferState::Requested.into()
        }
    );
    assert_eq!(consumer.get(requested.id()), before);
}

#[test]
fn provider_termination_reaches_the_consumer() {
    let (consumer, provider) = connected_nodes();
    let requested = initiate(&consumer, &provider);
    consumer.transfer_machine.tick().unwrap();
    provider.transfer_machine.tick().unwrap();
    let shared = provider.lookup(requested.id().as_str()).unwrap();

    provider
        .commands
        .dispatch(&Command::terminate(shared.id().clone(), "asset withdrawn"))
        .unwrap();
    provider.transfer_machine.tick().unwrap();

    assert_eq!(provider.get(shared.id()).state(), TransferState::Terminated.into());
    let ours = consumer.get(requested.id());
    assert_eq!(ours.state(), TransferState::Terminated.into());
    assert_eq!(ours.error_detail(), Some("asset withdrawn"));
}

#[test]
fn termination_without_reason_leaves_a_detail() {
    let (consumer, provider) = connected_nodes();
    let requested = initiate(&consumer, &provider);
    consumer.transfer_machine.tick().unwrap();
    let ours = consumer.get(requested.id());
    assert_eq!(ours.state(), TransferState::Requested.into());

    let request = ProtocolRequest::chained(
        Claims::for_participant(provider.participant_id.clone()),
        requested.id().as_str(),
        json!({ TYPE: DSPACE_TYPE_TRANSFER_TERMINATION_MESSAGE }),
        ours.integrity_token(),
    );
    assert!(consumer.transfers.terminated(&request).unwrap().is_ok());

    let terminated = consumer.get(requested.id());
    assert_eq!(terminated.state(), TransferState::Terminated.into());
    assert_eq!(terminated.error_detail(), Some(TERMINATED_BY_COUNTER_PARTY));
}
