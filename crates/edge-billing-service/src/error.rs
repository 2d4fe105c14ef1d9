//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use edge_billing_core::BillingError;

use crate::accounts::DirectoryError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden - valid credentials but insufficient permissions.
    #[error("forbidden")]
    Forbidden,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - malformed input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Well-formed input the billing functions cannot act on.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A required integration is not configured.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// External service error.
    #[error("external service error from {provider}: {message}")]
    ExternalService {
        /// The failing service, reported back as `details.provider`.
        provider: String,
        /// Error message.
        message: String,
    },
}

/// Provider name reported for account directory failures.
const DIRECTORY_PROVIDER: &str = "account_directory";

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string(), None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
                None,
            ),
            Self::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            Self::ExternalService { provider, message } => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                message.clone(),
                Some(serde_json::json!({ "provider": provider })),
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::NotFound { .. } => Self::NotFound(err.to_string()),
            BillingError::Validation(msg) => Self::Validation(msg),
            BillingError::InvalidId(e) => Self::BadRequest(e.to_string()),
            BillingError::Upstream { provider, message } => {
                Self::ExternalService { provider, message }
            }
            BillingError::UnexpectedResponse(msg) | BillingError::Configuration(msg) => {
                Self::Internal(msg)
            }
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Denied { status, message } => {
                tracing::debug!(status, message = %message, "Account directory denied request");
                Self::Forbidden
            }
            DirectoryError::Configuration(msg) => Self::Internal(msg),
            other => Self::ExternalService {
                provider: DIRECTORY_PROVIDER.to_string(),
                message: other.to_string(),
            },
        }
    }
}
