//! Shared test utilities and fixtures
//!
//! Process builders, protocol documents, a single-store command harness and a
//! two-node setup whose outbound messages are delivered straight into the peer's
//! protocol services.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock, Weak};

use serde_json::{Value, json};

use conduit_engine::{
    Clock, CommandDispatcher, DispatchError, ListenerHub, ManualClock, NegotiationService,
    ProcessListener, ProtocolError, ProtocolRequest, RecordingListener, RemoteMessage,
    RemoteMessageDispatcher, StateMachine, StateMachineContext, StateMachineSettings,
    TransferService,
};
use conduit_store::{InMemoryProcessStore, ProcessStore, RecordingStore};
use conduit_types::{
    Claims, IntegrityToken, NewProcess, Process, ProcessId, ProcessState, ProtocolResponse, Role,
};
use conduit_validator::MessageType;
use conduit_validator::first_string;
use conduit_validator::vocab::{
    DCT_PROPERTY_FORMAT, DSPACE_PROPERTY_AGREEMENT, DSPACE_PROPERTY_AGREEMENT_ID,
    DSPACE_PROPERTY_CALLBACK_ADDRESS, DSPACE_PROPERTY_OFFER, DSPACE_PROPERTY_PROCESS_ID,
    DSPACE_TYPE_CONTRACT_OFFER_MESSAGE, ID, ODRL_POLICY_TYPE_AGREEMENT, ODRL_POLICY_TYPE_OFFER,
    ODRL_TARGET_ATTRIBUTE, TYPE,
};

pub const PROTOCOL: &str = "dataspace-protocol-http";

/// A persisted-looking process with a fixed id.
pub fn process(id: &str, state: impl Into<ProcessState>, updated_at: i64) -> Process {
    Process::new(
        NewProcess {
            id: Some(id.to_string()),
            role: Role::Consumer,
            state: state.into(),
            correlation_id: None,
            counter_party_id: "provider-b".to_string(),
            counter_party_address: "http://provider/dsp".to_string(),
            protocol: PROTOCOL.to_string(),
            payload: json!({}),
        },
        updated_at,
    )
    .expect("valid process")
}

fn target(asset: &str) -> Value {
    json!([{ ID: asset }])
}

/// A contract offer message with one complete offer entry.
pub fn offer_message() -> Value {
    json!({
        TYPE: [DSPACE_TYPE_CONTRACT_OFFER_MESSAGE],
        DSPACE_PROPERTY_OFFER: [{
            TYPE: ODRL_POLICY_TYPE_OFFER,
            ID: "offer-1",
            ODRL_TARGET_ATTRIBUTE: target("asset-1"),
        }],
    })
}

/// Payload a consumer negotiates with: the offer it asks for, the agreement it
/// expects back and where to reach it.
pub fn negotiation_payload(callback: &str) -> Value {
    json!({
        DSPACE_PROPERTY_OFFER: [{
            TYPE: ODRL_POLICY_TYPE_OFFER,
            ID: "offer-1",
            ODRL_TARGET_ATTRIBUTE: target("asset-1"),
        }],
        DSPACE_PROPERTY_AGREEMENT: [{
            TYPE: ODRL_POLICY_TYPE_AGREEMENT,
            ID: "agreement-1",
            ODRL_TARGET_ATTRIBUTE: target("asset-1"),
        }],
        DSPACE_PROPERTY_CALLBACK_ADDRESS: callback,
    })
}

pub fn transfer_payload(callback: &str) -> Value {
    json!({
        DSPACE_PROPERTY_AGREEMENT_ID: "agreement-1",
        DCT_PROPERTY_FORMAT: "HttpData-PULL",
        DSPACE_PROPERTY_CALLBACK_ADDRESS: callback,
    })
}

/// Command dispatcher over a recording store, with a recording listener and a
/// manual clock.
pub struct CommandHarness {
    pub store: Arc<RecordingStore>,
    pub listener: Arc<RecordingListener>,
    pub clock: Arc<ManualClock>,
    pub commands: CommandDispatcher,
}

impl CommandHarness {
    pub fn new(now: i64) -> Self {
        let store = Arc::new(RecordingStore::default());
        let listener = Arc::new(RecordingListener::default());
        let clock = Arc::new(ManualClock::new(now));

        let mut hub = ListenerHub::default();
        hub.register(Arc::clone(&listener) as Arc<dyn ProcessListener>);
        let commands = CommandDispatcher::with_default_handlers(
            Arc::clone(&store) as Arc<dyn ProcessStore>,
            Arc::new(hub),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );

        Self {
            store,
            listener,
            clock,
            commands,
        }
    }
}

/// Routes outbound messages to the peer node, computing the integrity token
/// the way a transport would.
struct PeerRoute {
    from: String,
    peer: OnceLock<Weak<Node>>,
}

impl RemoteMessageDispatcher for PeerRoute {
    fn dispatch(&self, message: &RemoteMessage) -> Result<(), DispatchError> {
        let Some(peer) = self.peer.get().and_then(Weak::upgrade) else {
            return Err(DispatchError::Transport(format!(
                "{} unreachable",
                message.counter_party_address
            )));
        };
        let correlation_id = first_string(&message.body, DSPACE_PROPERTY_PROCESS_ID)
            .unwrap_or_default()
            .to_string();
        let previous = peer.token_for(&correlation_id);
        let request = ProtocolRequest::chained(
            Claims::for_participant(self.from.clone()),
            correlation_id,
            message.body.clone(),
            previous.as_ref(),
        );

        let response = peer
            .deliver(message.message_type, &request)
            .map_err(|err| DispatchError::Transport(err.to_string()))?;
        if response.is_ok() {
            Ok(())
        } else {
            Err(DispatchError::Rejected {
                message_type: message.message_type,
                address: message.counter_party_address.clone(),
                detail: response.detail.unwrap_or_default(),
            })
        }
    }
}

/// One connector: its own store, services and pollers.
pub struct Node {
    pub participant_id: String,
    pub address: String,
    pub store: Arc<InMemoryProcessStore>,
    pub listener: Arc<RecordingListener>,
    pub clock: Arc<ManualClock>,
    pub commands: CommandDispatcher,
    pub negotiations: NegotiationService,
    pub transfers: TransferService,
    pub negotiation_machine: StateMachine,
    pub transfer_machine: StateMachine,
    route: Arc<PeerRoute>,
}

impl Node {
    fn new(participant_id: &str, address: &str) -> Self {
        let store = Arc::new(InMemoryProcessStore::new(participant_id, 60_000));
        let listener = Arc::new(RecordingListener::default());
        let clock = Arc::new(ManualClock::new(1_000));
        let route = Arc::new(PeerRoute {
            from: participant_id.to_string(),
            peer: OnceLock::new(),
        });

        let mut hub = ListenerHub::default();
        hub.register(Arc::clone(&listener) as Arc<dyn ProcessListener>);
        let listeners = Arc::new(hub);
        let dyn_store = Arc::clone(&store) as Arc<dyn ProcessStore>;

        let commands = CommandDispatcher::with_default_handlers(
            Arc::clone(&dyn_store),
            Arc::clone(&listeners),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        let negotiations = NegotiationService::new(
            Arc::clone(&dyn_store),
            Arc::clone(&listeners),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        let transfers = TransferService::new(
            Arc::clone(&dyn_store),
            Arc::clone(&listeners),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        let context = StateMachineContext {
            store: dyn_store,
            listeners,
            clock: Arc::clone(&clock) as Arc<dyn Clock>,
            dispatcher: Arc::clone(&route) as Arc<dyn RemoteMessageDispatcher>,
        };
        let settings = StateMachineSettings::default();

        Self {
            participant_id: participant_id.to_string(),
            address: address.to_string(),
            store,
            listener,
            clock,
            commands,
            negotiations,
            transfers,
            negotiation_machine: StateMachine::negotiation(context.clone(), settings),
            transfer_machine: StateMachine::transfer(context, settings),
            route,
        }
    }

    /// Process addressed by a peer: by stored correlation id, else by local id.
    pub fn lookup(&self, correlation_id: &str) -> Option<Process> {
        if let Some(process) = self
            .store
            .find_by_correlation_id(correlation_id)
            .expect("find by correlation id")
        {
            return Some(process);
        }
        let id = ProcessId::new(correlation_id).ok()?;
        self.store.find(&id).expect("find")
    }

    pub fn get(&self, id: &ProcessId) -> Process {
        self.store.find(id).expect("find").expect("process exists")
    }

    fn token_for(&self, correlation_id: &str) -> Option<IntegrityToken> {
        self.lookup(correlation_id)
            .and_then(|process| process.integrity_token().cloned())
    }

    fn deliver(
        &self,
        message_type: MessageType,
        request: &ProtocolRequest,
    ) -> Result<ProtocolResponse, ProtocolError> {
        match message_type {
            MessageType::ContractRequest => self.negotiations.requested(request),
            MessageType::ContractOffer => self.negotiations.offered(request),
            MessageType::NegotiationAccepted => self.negotiations.accepted(request),
            MessageType::ContractAgreement => self.negotiations.agreed(request),
            MessageType::AgreementVerification => self.negotiations.verified(request),
            MessageType::NegotiationFinalized => self.negotiations.finalized(request),
            MessageType::NegotiationTermination => self.negotiations.terminated(request),
            MessageType::TransferRequest => self.transfers.requested(request),
            MessageType::TransferStart => self.transfers.started(request),
            MessageType::TransferCompletion => self.transfers.completed(request),
            MessageType::TransferTermination => self.transfers.terminated(request),
        }
    }
}

/// A consumer and a provider wired to each other.
pub fn connected_nodes() -> (Arc<Node>, Arc<Node>) {
    let consumer = Arc::new(Node::new("consumer-a", "http://consumer/dsp"));
    let provider = Arc::new(Node::new("provider-b", "http://provider/dsp"));
    let _ = consumer.route.peer.set(Arc::downgrade(&provider));
    let _ = provider.route.peer.set(Arc::downgrade(&consumer));
    (consumer, provider)
}
