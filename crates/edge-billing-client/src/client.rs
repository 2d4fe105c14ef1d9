//! Billing-functions HTTP client implementation.

use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use edge_billing_core::AccountId;

use crate::error::ClientError;
use crate::types::{
    AccountArgs, ApiErrorResponse, BillingStatusResponse, FunctionCall, NewSubscriptionRequest,
    NoArgs, Plan, PortalRequest, SessionUrl,
};

const FUNCTIONS_PATH: &str = "/functions/billing";

/// Client for the billing-functions endpoint.
///
/// Every call is made as the user whose access token the client holds.
#[derive(Debug, Clone)]
pub struct BillingFunctionsClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl BillingFunctionsClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the billing service (e.g., `"http://edge-billing:8080"`)
    /// * `access_token` - The end user's Supabase access token
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::with_options(base_url, access_token, ClientOptions::default())
    }

    /// Create a new client with custom options.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    /// The same client acting as another user.
    #[must_use]
    pub fn with_access_token(&self, access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..self.clone()
        }
    }

    /// List the plans available for subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_plans(&self) -> Result<Vec<Plan>, ClientError> {
        self.call("get_plans", NoArgs {}).await
    }

    /// Current billing status of an account.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Forbidden`] if the caller cannot see the account.
    pub async fn get_billing_status(
        &self,
        account_id: &AccountId,
    ) -> Result<BillingStatusResponse, ClientError> {
        self.call("get_billing_status", AccountArgs { account_id })
            .await
    }

    /// Checkout URL for a new subscription. Owners only.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Forbidden`] if the caller is not an owner.
    pub async fn get_new_subscription_url(
        &self,
        request: &NewSubscriptionRequest,
    ) -> Result<SessionUrl, ClientError> {
        self.call("get_new_subscription_url", request).await
    }

    /// Billing portal URL for an account's customer. Owners only.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Forbidden`] if the caller is not an owner.
    pub async fn get_billing_portal_url(
        &self,
        request: &PortalRequest,
    ) -> Result<SessionUrl, ClientError> {
        self.call("get_billing_portal_url", request).await
    }

    async fn call<A: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        action: &'static str,
        args: A,
    ) -> Result<T, ClientError> {
        let url = format!("{}{FUNCTIONS_PATH}", self.base_url);

        tracing::debug!(action, "Calling billing function");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&FunctionCall { action, args })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            return Ok(serde_json::from_slice(&body)?);
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }

        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let message = api_error.error.message;
                match status {
                    StatusCode::FORBIDDEN => Err(ClientError::Forbidden { message }),
                    StatusCode::NOT_FOUND => Err(ClientError::NotFound { message }),
                    _ => Err(ClientError::Api {
                        code: api_error.error.code,
                        message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}
