//! Single-purpose structural checks. Each is stateless and reports violations
//! relative to the document it is given.

use serde_json::Value;

use conduit_types::{ValidationFailure, ValidationResult, Violation, result_from};

use crate::document::{declared_types, first_string, is_blank};
use crate::vocab::TYPE;

/// A pure check over a semantic document.
pub trait Validator: Send + Sync {
    fn validate(&self, document: &Value) -> ValidationResult;
}

impl<F> Validator for F
where
    F: Fn(&Value) -> ValidationResult + Send + Sync,
{
    fn validate(&self, document: &Value) -> ValidationResult {
        self(document)
    }
}

/// Fails when `property` is absent or blank.
#[derive(Debug, Clone)]
pub struct MandatoryValue {
    property: String,
}

impl MandatoryValue {
    #[must_use]
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
        }
    }
}

impl Validator for MandatoryValue {
    fn validate(&self, document: &Value) -> ValidationResult {
        match document.get(&self.property) {
            Some(value) if !is_blank(value) => Ok(()),
            _ => Err(ValidationFailure::single(Violation::new(
                self.property.as_str(),
                format!("mandatory value '{}' is missing or it is blank", self.property),
            ))),
        }
    }
}

/// Applies `element` to every entry of the array under `property`.
///
/// Violations are re-located under `<property>/<index>`. A single object is
/// treated as a one-element array. An absent property passes; pair with
/// [`MandatoryValue`] when the array itself is required.
pub struct ForEach {
    property: String,
    element: Box<dyn Validator>,
}

impl ForEach {
    pub fn new(property: impl Into<String>, element: impl Validator + 'static) -> Self {
        Self {
            property: property.into(),
            element: Box::new(element),
        }
    }

    fn check_element(&self, index: usize, item: &Value, violations: &mut Vec<Violation>) {
        if let Err(failure) = self.element.validate(item) {
            let prefix = format!("{}/{index}", self.property);
            violations.extend(
                failure
                    .into_violations()
                    .into_iter()
                    .map(|v| v.prefixed(&prefix)),
            );
        }
    }
}

impl Validator for ForEach {
    fn validate(&self, document: &Value) -> ValidationResult {
        let mut violations = Vec::new();
        match document.get(&self.property) {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    self.check_element(index, item, &mut violations);
                }
            }
            Some(item @ Value::Object(_)) => self.check_element(0, item, &mut violations),
            Some(_) => violations.push(Violation::new(
                self.property.as_str(),
                format!("'{}' must be an object or an array of objects", self.property),
            )),
        }
        result_from(violations)
    }
}

/// Fails unless the document's declared `@type` set contains `expected`.
#[derive(Debug, Clone)]
pub struct TypeIs {
    expected: String,
}

impl TypeIs {
    #[must_use]
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl Validator for TypeIs {
    fn validate(&self, document: &Value) -> ValidationResult {
        let types = declared_types(document);
        if types.contains(&self.expected.as_str()) {
            return Ok(());
        }
        let message = if types.is_empty() {
            format!("'{TYPE}' is missing, expected '{}'", self.expected)
        } else {
            format!(
                "'{TYPE}' was expected to contain '{}' but it was {types:?}",
                self.expected
            )
        };
        Err(ValidationFailure::single(Violation::new(TYPE, message)))
    }
}

/// Fails unless the first scalar of `property` equals `expected`.
#[derive(Debug, Clone)]
pub struct ValueIs {
    property: String,
    expected: String,
}

impl ValueIs {
    #[must_use]
    pub fn new(property: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            expected: expected.into(),
        }
    }
}

impl Validator for ValueIs {
    fn validate(&self, document: &Value) -> ValidationResult {
        match first_string(document, &self.property) {
            Some(actual) if actual == self.expected => Ok(()),
            actual => Err(ValidationFailure::single(Violation::new(
                self.property.as_str(),
                format!(
                    "'{}' was expected to be '{}' but it was {actual:?}",
                    self.property, self.expected
                ),
            ))),
        }
    }
}
