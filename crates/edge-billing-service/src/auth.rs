//! Authentication extractors and authorization guards.
//!
//! - [`AuthUser`] - an end user authenticated by a Supabase JWT
//! - [`require_authorized_billing_user`] - the user may see an account's billing
//! - [`require_billing_owner`] - the user may change an account's billing

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use edge_billing_core::AccountId;

use crate::accounts::{AccountBillingInfo, AccountRole};
use crate::error::ApiError;
use crate::state::AppState;

/// An authenticated user extracted from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: Uuid,
    /// The raw token, forwarded to the account directory.
    pub token: String,
}

/// JWT claims issued by Supabase auth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Audience (can be string or array).
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    /// Expiration time.
    pub exp: i64,
    /// Issued at.
    #[serde(default)]
    pub iat: Option<i64>,
    /// Database role the token maps to.
    #[serde(default)]
    pub role: Option<String>,
    /// User email.
    #[serde(default)]
    pub email: Option<String>,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        let claims = validate_jwt(token, state)?;

        let user_id = claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(AuthUser {
            user_id,
            token: token.to_string(),
        })
    }
}

/// Validate an HS256 token against the configured secret and audience.
fn validate_jwt(token: &str, state: &AppState) -> Result<JwtClaims, ApiError> {
    let Some(secret) = state.config.supabase_jwt_secret.as_ref() else {
        tracing::error!("JWT secret not configured - rejecting all user tokens");
        return Err(ApiError::Unauthorized);
    };

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[&state.config.jwt_audience]);

    let token_data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        ApiError::Unauthorized
    })?;

    Ok(token_data.claims)
}

/// Load the caller's billing view of an account.
///
/// The lookup runs with the caller's own token, so an account the caller
/// cannot see is refused by the directory and surfaces as 403.
pub async fn require_authorized_billing_user(
    state: &AppState,
    user: &AuthUser,
    account_id: &AccountId,
) -> Result<AccountBillingInfo, ApiError> {
    let directory = state
        .directory
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Account directory not configured".into()))?;

    let info = directory.billing_info(&user.token, account_id).await?;

    tracing::debug!(
        user_id = %user.user_id,
        account_id = %account_id,
        role = ?info.account_role,
        "Billing user authorized"
    );

    Ok(info)
}

/// Require the owner role on an account.
pub fn require_billing_owner(info: &AccountBillingInfo) -> Result<(), ApiError> {
    if info.account_role == AccountRole::Owner {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
