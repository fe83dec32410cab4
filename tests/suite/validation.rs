//! Message validation tests

use serde_json::json;

use conduit_validator::vocab::{
    DSPACE_PROPERTY_CALLBACK_ADDRESS, DSPACE_PROPERTY_OFFER, DSPACE_TYPE_CONTRACT_OFFER_MESSAGE,
    DSPACE_TYPE_CONTRACT_REQUEST_MESSAGE, ID, ODRL_TARGET_ATTRIBUTE, TYPE,
};
use conduit_validator::{MessageType, Validator, contract_offer_message};

use crate::common::{negotiation_payload, offer_message};

#[test]
fn complete_offer_message_is_valid() {
    assert!(contract_offer_message().validate(&offer_message()).is_ok());
    assert!(
        MessageType::ContractOffer
            .validator()
            .validate(&offer_message())
            .is_ok()
    );
}

#[test]
fn empty_document_reports_only_the_missing_type() {
    let failure = contract_offer_message().validate(&json!({})).unwrap_err();

    assert_eq!(failure.violations().len(), 1);
    assert_eq!(failure.violations()[0].path, TYPE);
}

#[test]
fn offer_entry_without_id_and_target_reports_both() {
    let document = json!({
        TYPE: [DSPACE_TYPE_CONTRACT_OFFER_MESSAGE],
        DSPACE_PROPERTY_OFFER: [{}],
    });

    let failure = contract_offer_message().validate(&document).unwrap_err();
    let paths: Vec<&str> = failure
        .violations()
        .iter()
        .map(|v| v.path.as_str())
        .collect();

    assert_eq!(paths.len(), 2);
    assert!(paths.iter().all(|p| p.starts_with(DSPACE_PROPERTY_OFFER)));
    assert!(paths.iter().any(|p| p.ends_with(ID)));
    assert!(paths.iter().any(|p| p.ends_with(ODRL_TARGET_ATTRIBUTE)));
}

#[test]
fn empty_offer_list_is_missing() {
    let document = json!({
        TYPE: [DSPACE_TYPE_CONTRACT_OFFER_MESSAGE],
        DSPACE_PROPERTY_OFFER: [],
    });

    let failure = contract_offer_message().validate(&document).unwrap_err();
    assert_eq!(failure.violations().len(), 1);
    assert_eq!(failure.violations()[0].path, DSPACE_PROPERTY_OFFER);
}

#[test]
fn every_offer_entry_is_checked() {
    let document = json!({
        TYPE: DSPACE_TYPE_CONTRACT_OFFER_MESSAGE,
        DSPACE_PROPERTY_OFFER: [
            { ID: "offer-1", ODRL_TARGET_ATTRIBUTE: [{ ID: "asset-1" }] },
            { ID: "offer-2" },
            {},
        ],
    });

    let failure = contract_offer_message().validate(&document).unwrap_err();
    assert_eq!(failure.violations().len(), 3);
}

#[test]
fn contract_request_needs_a_callback_address() {
    let mut document = negotiation_payload("http://consumer/callback");
    document[TYPE] = json!(DSPACE_TYPE_CONTRACT_REQUEST_MESSAGE);
    assert!(MessageType::ContractRequest.validator().validate(&document).is_ok());

    document
        .as_object_mut()
        .unwrap()
        .remove(DSPACE_PROPERTY_CALLBACK_ADDRESS);
    let failure = MessageType::ContractRequest
        .validator()
        .validate(&document)
        .unwrap_err();
    assert_eq!(failure.violations().len(), 1);
    assert_eq!(failure.violations()[0].path, DSPACE_PROPERTY_CALLBACK_ADDRESS);
}

#[test]
fn wrong_message_type_is_rejected() {
    let failure = MessageType::ContractRequest
        .validator()
        .validate(&offer_message())
        .unwrap_err();
    assert!(failure.describe().contains(DSPACE_TYPE_CONTRACT_REQUEST_MESSAGE));
}
