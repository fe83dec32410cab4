//! Expanded JSON-LD terms used by protocol messages.

pub const TYPE: &str = "@type";
pub const ID: &str = "@id";
pub const VALUE: &str = "@value";

pub const DSPACE_NAMESPACE: &str = "https://w3id.org/dspace/v0.8/";
pub const ODRL_NAMESPACE: &str = "http://www.w3.org/ns/odrl/2/";
pub const DCT_NAMESPACE: &str = "http://purl.org/dc/terms/";

// Negotiation message types
pub const DSPACE_TYPE_CONTRACT_REQUEST_MESSAGE: &str =
    "https://w3id.org/dspace/v0.8/ContractRequestMessage";
pub const DSPACE_TYPE_CONTRACT_OFFER_MESSAGE: &str =
    "https://w3id.org/dspace/v0.8/ContractOfferMessage";
pub const DSPACE_TYPE_CONTRACT_AGREEMENT_MESSAGE: &str =
    "https://w3id.org/dspace/v0.8/ContractAgreementMessage";
pub const DSPACE_TYPE_CONTRACT_AGREEMENT_VERIFICATION_MESSAGE: &str =
    "https://w3id.org/dspace/v0.8/ContractAgreementVerificationMessage";
pub const DSPACE_TYPE_CONTRACT_NEGOTIATION_EVENT_MESSAGE: &str =
    "https://w3id.org/dspace/v0.8/ContractNegotiationEventMessage";
pub const DSPACE_TYPE_CONTRACT_NEGOTIATION_TERMINATION_MESSAGE: &str =
    "https://w3id.org/dspace/v0.8/ContractNegotiationTerminationMessage";

// Transfer message types
pub const DSPACE_TYPE_TRANSFER_REQUEST_MESSAGE: &str =
    "https://w3id.org/dspace/v0.8/TransferRequestMessage";
pub const DSPACE_TYPE_TRANSFER_START_MESSAGE: &str =
    "https://w3id.org/dspace/v0.8/TransferStartMessage";
pub const DSPACE_TYPE_TRANSFER_COMPLETION_MESSAGE: &str =
    "https://w3id.org/dspace/v0.8/TransferCompletionMessage";
pub const DSPACE_TYPE_TRANSFER_TERMINATION_MESSAGE: &str =
    "https://w3id.org/dspace/v0.8/TransferTerminationMessage";

// Properties
pub const DSPACE_PROPERTY_OFFER: &str = "https://w3id.org/dspace/v0.8/offer";
pub const DSPACE_PROPERTY_AGREEMENT: &str = "https://w3id.org/dspace/v0.8/agreement";
pub const DSPACE_PROPERTY_PROCESS_ID: &str = "https://w3id.org/dspace/v0.8/processId";
pub const DSPACE_PROPERTY_CALLBACK_ADDRESS: &str =
    "https://w3id.org/dspace/v0.8/callbackAddress";
pub const DSPACE_PROPERTY_EVENT_TYPE: &str = "https://w3id.org/dspace/v0.8/eventType";
pub const DSPACE_PROPERTY_AGREEMENT_ID: &str = "https://w3id.org/dspace/v0.8/agreementId";
pub const DSPACE_PROPERTY_CODE: &str = "https://w3id.org/dspace/v0.8/code";
pub const DSPACE_PROPERTY_REASON: &str = "https://w3id.org/dspace/v0.8/reason";
pub const DCT_PROPERTY_FORMAT: &str = "http://purl.org/dc/terms/format";

// Negotiation event values
pub const DSPACE_EVENT_ACCEPTED: &str = "https://w3id.org/dspace/v0.8/ACCEPTED";
pub const DSPACE_EVENT_FINALIZED: &str = "https://w3id.org/dspace/v0.8/FINALIZED";

// ODRL
pub const ODRL_POLICY_TYPE_OFFER: &str = "http://www.w3.org/ns/odrl/2/Offer";
pub const ODRL_POLICY_TYPE_AGREEMENT: &str = "http://www.w3.org/ns/odrl/2/Agreement";
pub const ODRL_TARGET_ATTRIBUTE: &str = "http://www.w3.org/ns/odrl/2/target";
