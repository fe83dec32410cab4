//! Outbound protocol messages.
//!
//! The wire transport is an external collaborator. Pollers hand it a
//! [`RemoteMessage`] through [`RemoteMessageDispatcher`] and only care whether the
//! peer accepted it.

use serde_json::{Map, Value};

use conduit_types::{Process, ProcessId};
use conduit_validator::MessageType;
use conduit_validator::vocab::{
    DSPACE_EVENT_ACCEPTED, DSPACE_EVENT_FINALIZED, DSPACE_PROPERTY_EVENT_TYPE,
    DSPACE_PROPERTY_PROCESS_ID, DSPACE_PROPERTY_REASON, TYPE,
};

use crate::error::DispatchError;

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMessage {
    pub message_type: MessageType,
    pub process_id: ProcessId,
    pub counter_party_address: String,
    pub protocol: String,
    pub body: Value,
}

impl RemoteMessage {
    /// Build the outbound message of `message_type` for `process`.
    ///
    /// The body starts from the process payload and adds the `@type`
    /// discriminant and the peer-facing process id (the correlation id when
    /// known). Event and termination messages carry their event type and reason.
    #[must_use]
    pub fn for_process(message_type: MessageType, process: &Process) -> Self {
        let mut body = match process.payload() {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        body.insert(TYPE.to_string(), Value::from(message_type.type_iri()));
        let peer_id = process
            .correlation_id()
            .unwrap_or_else(|| process.id().as_str());
        body.insert(DSPACE_PROPERTY_PROCESS_ID.to_string(), Value::from(peer_id));

        match message_type {
            MessageType::NegotiationAccepted => {
                body.insert(
                    DSPACE_PROPERTY_EVENT_TYPE.to_string(),
                    Value::from(DSPACE_EVENT_ACCEPTED),
                );
            }
            MessageType::NegotiationFinalized => {
                body.insert(
                    DSPACE_PROPERTY_EVENT_TYPE.to_string(),
                    Value::from(DSPACE_EVENT_FINALIZED),
                );
            }
            MessageType::NegotiationTermination | MessageType::TransferTermination => {
                if let Some(reason) = process.error_detail() {
                    body.insert(DSPACE_PROPERTY_REASON.to_string(), Value::from(reason));
                }
            }
            _ => {}
        }

        Self {
            message_type,
            process_id: process.id().clone(),
            counter_party_address: process.counter_party_address().to_string(),
            protocol: process.protocol().to_string(),
            body: Value::Object(body),
        }
    }
}

pub trait RemoteMessageDispatcher: Send + Sync {
    /// Deliver `message`. `Ok` means the peer acknowledged it.
    fn dispatch(&self, message: &RemoteMessage) -> Result<(), DispatchError>;
}

/// Dispatcher for deployments without a transport: logs and acknowledges.
#[derive(Debug, Default)]
pub struct LoggingDispatcher;

impl RemoteMessageDispatcher for LoggingDispatcher {
    fn dispatch(&self, message: &RemoteMessage) -> Result<(), DispatchError> {
        tracing::info!(
            process_id = %message.process_id,
            message_type = %message.message_type,
            address = %message.counter_party_address,
            protocol = %message.protocol,
            "Outbound message (no transport configured)"
        );
        Ok(())
    }
}
