//! Composite validator with structural gating.

use serde_json::Value;

use conduit_types::{ValidationFailure, ValidationResult, Violation, result_from};

use crate::rules::{ForEach, MandatoryValue, TypeIs, Validator, ValueIs};
use crate::vocab::TYPE;

/// A validator over one JSON object, built from prerequisites and checks.
///
/// Prerequisites run first. If any of them fails, only their violations are
/// reported and no check runs: nested checks against a document without its
/// discriminant would only produce noise. Once every prerequisite holds, all
/// checks run and every violation is collected.
pub struct JsonObjectValidator {
    prerequisites: Vec<Box<dyn Validator>>,
    checks: Vec<Box<dyn Validator>>,
}

impl JsonObjectValidator {
    #[must_use]
    pub fn builder() -> JsonObjectValidatorBuilder {
        JsonObjectValidatorBuilder::default()
    }
}

impl Validator for JsonObjectValidator {
    fn validate(&self, document: &Value) -> ValidationResult {
        let gate = collect(&self.prerequisites, document);
        if !gate.is_empty() {
            return result_from(gate);
        }
        result_from(collect(&self.checks, document))
    }
}

fn collect(validators: &[Box<dyn Validator>], document: &Value) -> Vec<Violation> {
    validators
        .iter()
        .filter_map(|validator| validator.validate(document).err())
        .flat_map(ValidationFailure::into_violations)
        .collect()
}

#[derive(Default)]
pub struct JsonObjectValidatorBuilder {
    prerequisites: Vec<Box<dyn Validator>>,
    checks: Vec<Box<dyn Validator>>,
}

impl JsonObjectValidatorBuilder {
    /// Gate on a present `@type` and require it to contain `expected`.
    #[must_use]
    pub fn discriminant(self, expected: &str) -> Self {
        self.require(MandatoryValue::new(TYPE))
            .verify(TypeIs::new(expected))
    }

    /// Add a prerequisite; when it fails no regular check runs.
    #[must_use]
    pub fn require(mut self, validator: impl Validator + 'static) -> Self {
        self.prerequisites.push(Box::new(validator));
        self
    }

    #[must_use]
    pub fn verify(mut self, validator: impl Validator + 'static) -> Self {
        self.checks.push(Box::new(validator));
        self
    }

    #[must_use]
    pub fn mandatory(self, property: &str) -> Self {
        self.verify(MandatoryValue::new(property))
    }

    /// Require a non-empty array under `property` and validate each element.
    #[must_use]
    pub fn mandatory_each(self, property: &str, element: impl Validator + 'static) -> Self {
        self.mandatory(property).for_each(property, element)
    }

    #[must_use]
    pub fn for_each(self, property: &str, element: impl Validator + 'static) -> Self {
        self.verify(ForEach::new(property, element))
    }

    #[must_use]
    pub fn value_is(self, property: &str, expected: &str) -> Self {
        self.verify(ValueIs::new(property, expected))
    }

    #[must_use]
    pub fn build(self) -> JsonObjectValidator {
        JsonObjectValidator {
            prerequisites: self.prerequisites,
            checks: self.checks,
        }
    }
}
