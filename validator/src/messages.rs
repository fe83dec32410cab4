//! Validators for every inbound protocol message.

use std::fmt;

use crate::object::JsonObjectValidator;
use crate::vocab::{
    DCT_PROPERTY_FORMAT, DSPACE_EVENT_ACCEPTED, DSPACE_EVENT_FINALIZED,
    DSPACE_PROPERTY_AGREEMENT, DSPACE_PROPERTY_AGREEMENT_ID, DSPACE_PROPERTY_CALLBACK_ADDRESS,
    DSPACE_PROPERTY_EVENT_TYPE, DSPACE_PROPERTY_OFFER, DSPACE_TYPE_CONTRACT_AGREEMENT_MESSAGE,
    DSPACE_TYPE_CONTRACT_AGREEMENT_VERIFICATION_MESSAGE,
    DSPACE_TYPE_CONTRACT_NEGOTIATION_EVENT_MESSAGE,
    DSPACE_TYPE_CONTRACT_NEGOTIATION_TERMINATION_MESSAGE, DSPACE_TYPE_CONTRACT_OFFER_MESSAGE,
    DSPACE_TYPE_CONTRACT_REQUEST_MESSAGE, DSPACE_TYPE_TRANSFER_COMPLETION_MESSAGE,
    DSPACE_TYPE_TRANSFER_REQUEST_MESSAGE, DSPACE_TYPE_TRANSFER_START_MESSAGE,
    DSPACE_TYPE_TRANSFER_TERMINATION_MESSAGE, ID, ODRL_TARGET_ATTRIBUTE,
};

/// Every inbound message this connector accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    ContractRequest,
    ContractOffer,
    NegotiationAccepted,
    ContractAgreement,
    AgreementVerification,
    NegotiationFinalized,
    NegotiationTermination,
    TransferRequest,
    TransferStart,
    TransferCompletion,
    TransferTermination,
}

impl MessageType {
    pub const ALL: [MessageType; 11] = [
        MessageType::ContractRequest,
        MessageType::ContractOffer,
        MessageType::NegotiationAccepted,
        MessageType::ContractAgreement,
        MessageType::AgreementVerification,
        MessageType::NegotiationFinalized,
        MessageType::NegotiationTermination,
        MessageType::TransferRequest,
        MessageType::TransferStart,
        MessageType::TransferCompletion,
        MessageType::TransferTermination,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            MessageType::ContractRequest => "contract-request",
            MessageType::ContractOffer => "contract-offer",
            MessageType::NegotiationAccepted => "negotiation-accepted",
            MessageType::ContractAgreement => "contract-agreement",
            MessageType::AgreementVerification => "agreement-verification",
            MessageType::NegotiationFinalized => "negotiation-finalized",
            MessageType::NegotiationTermination => "negotiation-termination",
            MessageType::TransferRequest => "transfer-request",
            MessageType::TransferStart => "transfer-start",
            MessageType::TransferCompletion => "transfer-completion",
            MessageType::TransferTermination => "transfer-termination",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// The `@type` IRI the message must declare.
    #[must_use]
    pub const fn type_iri(self) -> &'static str {
        match self {
            MessageType::ContractRequest => DSPACE_TYPE_CONTRACT_REQUEST_MESSAGE,
            MessageType::ContractOffer => DSPACE_TYPE_CONTRACT_OFFER_MESSAGE,
            MessageType::NegotiationAccepted | MessageType::NegotiationFinalized => {
                DSPACE_TYPE_CONTRACT_NEGOTIATION_EVENT_MESSAGE
            }
            MessageType::ContractAgreement => DSPACE_TYPE_CONTRACT_AGREEMENT_MESSAGE,
            MessageType::AgreementVerification => {
                DSPACE_TYPE_CONTRACT_AGREEMENT_VERIFICATION_MESSAGE
            }
            MessageType::NegotiationTermination => {
                DSPACE_TYPE_CONTRACT_NEGOTIATION_TERMINATION_MESSAGE
            }
            MessageType::TransferRequest => DSPACE_TYPE_TRANSFER_REQUEST_MESSAGE,
            MessageType::TransferStart => DSPACE_TYPE_TRANSFER_START_MESSAGE,
            MessageType::TransferCompletion => DSPACE_TYPE_TRANSFER_COMPLETION_MESSAGE,
            MessageType::TransferTermination => DSPACE_TYPE_TRANSFER_TERMINATION_MESSAGE,
        }
    }

    #[must_use]
    pub fn validator(self) -> JsonObjectValidator {
        match self {
            MessageType::ContractRequest => contract_request_message(),
            MessageType::ContractOffer => contract_offer_message(),
            MessageType::NegotiationAccepted => negotiation_event_message(DSPACE_EVENT_ACCEPTED),
            MessageType::ContractAgreement => contract_agreement_message(),
            MessageType::NegotiationFinalized => {
                negotiation_event_message(DSPACE_EVENT_FINALIZED)
            }
            MessageType::TransferRequest => transfer_request_message(),
            MessageType::AgreementVerification
            | MessageType::NegotiationTermination
            | MessageType::TransferStart
            | MessageType::TransferCompletion
            | MessageType::TransferTermination => typed_only(self.type_iri()),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An offer or agreement entry: an identified policy pointing at a target asset.
fn policy_reference() -> JsonObjectValidator {
    JsonObjectValidator::builder()
        .mandatory(ID)
        .mandatory(ODRL_TARGET_ATTRIBUTE)
        .build()
}

fn typed_only(type_iri: &str) -> JsonObjectValidator {
    JsonObjectValidator::builder().discriminant(type_iri).build()
}

#[must_use]
pub fn contract_request_message() -> JsonObjectValidator {
    JsonObjectValidator::builder()
        .discriminant(DSPACE_TYPE_CONTRACT_REQUEST_MESSAGE)
        .mandatory_each(DSPACE_PROPERTY_OFFER, policy_reference())
        .mandatory(DSPACE_PROPERTY_CALLBACK_ADDRESS)
        .build()
}

#[must_use]
pub fn contract_offer_message() -> JsonObjectValidator {
    JsonObjectValidator::builder()
        .discriminant(DSPACE_TYPE_CONTRACT_OFFER_MESSAGE)
        .mandatory_each(DSPACE_PROPERTY_OFFER, policy_reference())
        .build()
}

#[must_use]
pub fn contract_agreement_message() -> JsonObjectValidator {
    JsonObjectValidator::builder()
        .discriminant(DSPACE_TYPE_CONTRACT_AGREEMENT_MESSAGE)
        .mandatory_each(DSPACE_PROPERTY_AGREEMENT, policy_reference())
        .build()
}

#[must_use]
pub fn negotiation_event_message(event_type: &str) -> JsonObjectValidator {
    JsonObjectValidator::builder()
        .discriminant(DSPACE_TYPE_CONTRACT_NEGOTIATION_EVENT_MESSAGE)
        .value_is(DSPACE_PROPERTY_EVENT_TYPE, event_type)
        .build()
}

#[must_use]
pub fn transfer_request_message() -> JsonObjectValidator {
    JsonObjectValidator::builder()
        .discriminant(DSPACE_TYPE_TRANSFER_REQUEST_MESSAGE)
        .mandatory(DSPACE_PROPERTY_AGREEMENT_ID)
        .mandatory(DCT_PROPERTY_FORMAT)
        .mandatory(DSPACE_PROPERTY_CALLBACK_ADDRESS)
        .build()
}
