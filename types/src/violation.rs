//! Outcome types of structural document validation.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A located, described failure of one structural check.
///
/// `path` is a `/`-separated locator into the validated document; array elements
/// appear as their index (`offer/0/@id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Re-locate this violation under `prefix`.
    #[must_use]
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.path = if self.path.is_empty() {
            prefix.to_string()
        } else {
            format!("{prefix}/{}", self.path)
        };
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Aggregated violations, in check-evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed with {} violation(s)", violations.len())]
pub struct ValidationFailure {
    violations: Vec<Violation>,
}

impl ValidationFailure {
    /// Returns `None` when `violations` is empty: a failure always carries at least one.
    #[must_use]
    pub fn new(violations: Vec<Violation>) -> Option<Self> {
        if violations.is_empty() {
            None
        } else {
            Some(Self { violations })
        }
    }

    #[must_use]
    pub fn single(violation: Violation) -> Self {
        Self {
            violations: vec![violation],
        }
    }

    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    #[must_use]
    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    /// One violation per line, for logs and CLI output.
    #[must_use]
    pub fn describe(&self) -> String {
        self.violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Success, or a failure carrying every violation found.
pub type ValidationResult = Result<(), ValidationFailure>;

/// Build a [`ValidationResult`] from collected violations.
#[must_use]
pub fn result_from(violations: Vec<Violation>) -> ValidationResult {
    match ValidationFailure::new(violations) {
        Some(failure) => Err(failure),
        None => Ok(()),
    }
}
