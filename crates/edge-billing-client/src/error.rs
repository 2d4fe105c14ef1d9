//! Client error types.

/// Errors that can occur when calling the billing functions.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The access token was missing, invalid or expired.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller may not perform this action on the account.
    #[error("forbidden: {message}")]
    Forbidden {
        /// Error message.
        message: String,
    },

    /// The account or billing record does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// Error message.
        message: String,
    },

    /// Server returned any other error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Whether the server rejected the request's input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Api { code, .. } if code == "validation_error")
    }
}
