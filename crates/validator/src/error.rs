//! Error types for the validation engine
//!
//! A failed validation is *not* an error: it is reported as `Ok(false)` plus
//! entries in the [`ErrorBag`](crate::ErrorBag). The variants below are
//! reserved for programmer mistakes.

use thiserror::Error;

/// Result type for validator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the rule registry and the validator
#[derive(Error, Debug)]
pub enum Error {
    /// A field references a rule that is not registered
    #[error("No such validator '{rule}' exists.")]
    UnknownRule {
        /// The rule name that failed to resolve
        rule: String,
    },

    /// A custom rule registration was malformed
    #[error("Extension Error: The validator '{name}' {reason}")]
    Extension {
        /// The rule name being registered
        name: String,
        /// Why the registration was rejected
        reason: String,
    },

    /// Strict mode lookup miss
    #[error("Validating a non-existent field: \"{selector}\". Use \"attach()\" first.")]
    FieldNotFound {
        /// The selector that did not resolve
        selector: String,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        /// The error message
        message: String,
        /// The underlying parse error
        #[source]
        source: Option<serde_json::Error>,
    },
}

impl Error {
    /// Create an unknown rule error
    pub fn unknown_rule(rule: impl Into<String>) -> Self {
        Self::UnknownRule { rule: rule.into() }
    }

    /// Create an extension error
    pub fn extension(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Extension {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a field-not-found error
    pub fn field_not_found(selector: impl Into<String>) -> Self {
        Self::FieldNotFound {
            selector: selector.into(),
        }
    }

    /// Returns true for the error raised by an unregistered rule.
    #[must_use]
    pub fn is_unknown_rule(&self) -> bool {
        matches!(self, Self::UnknownRule { .. })
    }

    /// Returns true for strict-mode lookup misses.
    #[must_use]
    pub fn is_field_not_found(&self) -> bool {
        matches!(self, Self::FieldNotFound { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Config {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
