//! Message Validator Framework.
//!
//! Validators are pure, stateless checks over semantic (expanded JSON-LD) documents.
//! They compose: [`JsonObjectValidator`] gates on the message's `@type` discriminant
//! and then collects the violations of every independent check, including every
//! element of nested arrays.
//!
//! ```text
//! JsonObjectValidator
//! ├── prerequisites: MandatoryValue(@type)       (stop here on failure)
//! └── checks: TypeIs, MandatoryValue, ForEach(…)  (all run, all violations kept)
//! ```

#![allow(clippy::missing_errors_doc)]

mod document;
mod messages;
mod object;
mod rules;
pub mod vocab;

pub use document::{declared_types, first_string, is_blank};
pub use messages::{
    MessageType, contract_agreement_message, contract_offer_message, contract_request_message,
    negotiation_event_message, transfer_request_message,
};
pub use object::{JsonObjectValidator, JsonObjectValidatorBuilder};
pub use rules::{ForEach, MandatoryValue, TypeIs, Validator, ValueIs};
