//! Consumer/provider negotiation tests
//!
//! Both connectors run in-process. Every outbound message is handed straight to
//! the peer's protocol service, so a poller tick on one side advances the other.

use conduit_engine::{DEFAULT_PROTOCOL, Initiation, ProtocolRequest, RemoteMessage};
use conduit_types::{Claims, Command, NegotiationState, Process, ProcessState, Role};
use conduit_validator::MessageType;

use crate::common::{Node, connected_nodes, negotiation_payload};

fn initiate(consumer: &Node, provider: &Node) -> Process {
    consumer
        .negotiations
        .initiate(Initiation {
            counter_party_id: provider.participant_id.clone(),
            counter_party_address: provider.address.clone(),
            payload: negotiation_payload(&consumer.address),
        })
        .unwrap()
}

fn state(node: &Node, process: &Process) -> ProcessState {
    node.get(process.id()).state()
}

#[test]
fn negotiation_runs_to_finalized_on_both_sides() {
    let (consumer, provider) = connected_nodes();
    let started = initiate(&consumer, &provider);

    // Consumer: INITIAL -> REQUESTING -> (ContractRequest) -> REQUESTED
    consumer.negotiation_machine.tick().unwrap();
    assert_eq!(state(&consumer, &started), NegotiationState::Requested.into());

    let offer = provider
        .lookup(started.id().as_str())
        .expect("provider side created");
    assert_eq!(offer.role(), Role::Provider);
    assert_eq!(offer.state(), NegotiationState::Requested.into());
    assert_eq!(offer.correlation_id(), Some(started.id().as_str()));
    assert_eq!(offer.counter_party_id(), "consumer-a");
    assert_eq!(offer.counter_party_address(), "http://consumer/dsp");
    assert_eq!(offer.protocol(), DEFAULT_PROTOCOL);

    // Provider: REQUESTED -> AGREEING -> (ContractAgreement) -> AGREED
    provider.negotiation_machine.tick().unwrap();
    assert_eq!(state(&provider, &offer), NegotiationState::Agreed.into());
    assert_eq!(state(&consumer, &started), NegotiationState::Agreed.into());

    // Consumer: AGREED -> VERIFYING -> (AgreementVerification) -> VERIFIED
    consumer.negotiation_machine.tick().unwrap();
    assert_eq!(state(&consumer, &started), NegotiationState::Verified.into());
    assert_eq!(state(&provider, &offer), NegotiationState::Verified.into());

    // Provider: VERIFIED -> FINALIZING -> (NegotiationFinalized) -> FINALIZED
    provider.negotiation_machine.tick().unwrap();
    assert_eq!(state(&provider, &offer), NegotiationState::Finalized.into());
    assert_eq!(state(&consumer, &started), NegotiationState::Finalized.into());

    let expected: Vec<ProcessState> = [
        NegotiationState::Initial,
        NegotiationState::Requesting,
        NegotiationState::Requested,
        NegotiationState::Agreed,
        NegotiationState::Verifying,
        NegotiationState::Verified,
        NegotiationState::Finalized,
    ]
    .into_iter()
    .map(Into::into)
    .collect();
    assert_eq!(consumer.listener.states_for(started.id()), expected);

    // Nothing is left to do once both sides are final.
    assert_eq!(consumer.negotiation_machine.tick().unwrap(), 0);
    assert_eq!(provider.negotiation_machine.tick().unwrap(), 0);
}

#[test]
fn consumer_termination_reaches_the_provider() {
    let (consumer, provider) = connected_nodes();
    let started = initiate(&consumer, &provider);
    consumer.negotiation_machine.tick().unwrap();
    provider.negotiation_machine.tick().unwrap();
    let offer = provider.lookup(started.id().as_str()).unwrap();
    assert_eq!(state(&consumer, &started), NegotiationState::Agreed.into());

    consumer
        .commands
        .dispatch(&Command::terminate(started.id().clone(), "budget withdrawn"))
        .unwrap();
    assert_eq!(state(&consumer, &started), NegotiationState::Terminating.into());

    consumer.negotiation_machine.tick().unwrap();

    let ours = consumer.get(started.id());
    assert_eq!(ours.state(), NegotiationState::Terminated.into());
    assert_eq!(ours.error_detail(), Some("budget withdrawn"));

    let theirs = provider.get(offer.id());
    assert_eq!(theirs.state(), NegotiationState::Terminated.into());
    assert_eq!(theirs.error_detail(), Some("budget withdrawn"));
}

#[test]
fn replayed_request_does_not_create_a_second_process() {
    let (consumer, provider) = connected_nodes();
    let started = initiate(&consumer, &provider);
    consumer.negotiation_machine.tick().unwrap();
    let offer = provider.lookup(started.id().as_str()).unwrap();

    // The consumer side never saw the acknowledgement and asks again.
    let retry = RemoteMessage::for_process(
        MessageType::ContractRequest,
        &consumer.get(started.id()),
    );
    let request = ProtocolRequest::chained(
        Claims::for_participant("consumer-a"),
        started.id().as_str(),
        retry.body,
        offer.integrity_token(),
    );
    assert!(provider.negotiations.requested(&request).unwrap().is_ok());

    assert_eq!(provider.store.len(), 1);
    assert_eq!(provider.get(offer.id()), offer);
}
