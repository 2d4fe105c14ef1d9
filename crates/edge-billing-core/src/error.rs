//! Error types for edge-billing.

use crate::ids::IdError;

/// Result type for edge-billing operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors that can occur in billing operations.
///
/// None of these are handled where they originate: every variant propagates
/// unchanged to the caller of the exported billing function.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// A requested upstream record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record ("customer", "subscription", ...).
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// A required input is missing or invalid.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The billing provider call failed (network, rate limit, server error).
    #[error("upstream error from {provider}: {message}")]
    Upstream {
        /// Provider name.
        provider: String,
        /// Error message.
        message: String,
    },

    /// The provider returned a payload we could not interpret.
    #[error("unexpected provider response: {0}")]
    UnexpectedResponse(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BillingError {
    /// Shorthand for a [`BillingError::NotFound`].
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for a [`BillingError::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
