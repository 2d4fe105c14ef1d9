//! Stripe API client implementation.

use reqwest::Client;
use std::time::Duration;

use edge_billing_core::{
    AccountId, BillingError, CustomerId, PlanId, SubscriptionId, ACCOUNT_ID_METADATA_KEY,
};

use super::types::{
    CheckoutSession, Customer, PortalSession, Price, StripeErrorResponse, StripeList,
    Subscription, WebhookEvent,
};
use super::webhook;

/// Error code Stripe uses for unknown ids, whatever the HTTP status.
const RESOURCE_MISSING: &str = "resource_missing";

/// Expansion that puts the product, and so the plan name, on a subscription.
const SUBSCRIPTION_PRODUCT_EXPANSION: &str = "items.data.price.product";

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid webhook signature.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Webhook timestamp outside the accepted tolerance.
    #[error("Webhook timestamp outside tolerance")]
    StaleTimestamp,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<StripeError> for BillingError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::Configuration(msg) => Self::Configuration(msg),
            StripeError::Serialization(e) => Self::UnexpectedResponse(e.to_string()),
            StripeError::Api {
                status: 404,
                message,
                ..
            } => Self::NotFound {
                entity: "stripe resource",
                id: message,
            },
            StripeError::Api {
                code: Some(code),
                message,
                ..
            } if code == RESOURCE_MISSING => Self::NotFound {
                entity: "stripe resource",
                id: message,
            },
            other => Self::Upstream {
                provider: "stripe".to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Parameters for a subscription-mode Checkout session.
#[derive(Debug, Clone)]
pub struct SubscriptionCheckout<'a> {
    /// Customer paying.
    pub customer_id: &'a CustomerId,
    /// Account the subscription is for.
    pub account_id: &'a AccountId,
    /// Price to subscribe to.
    pub plan_id: &'a PlanId,
    /// Absolute trial end (Unix seconds), if any.
    pub trial_end: Option<i64>,
    /// Redirect target on success.
    pub success_url: &'a str,
    /// Redirect target on cancel.
    pub cancel_url: &'a str,
}

/// Parameters for creating a subscription directly.
#[derive(Debug, Clone)]
pub struct NewSubscription<'a> {
    /// Customer to subscribe.
    pub customer_id: &'a CustomerId,
    /// Account the subscription is for.
    pub account_id: &'a AccountId,
    /// Price to subscribe to.
    pub plan_id: &'a PlanId,
    /// Absolute trial end (Unix seconds), if any.
    pub trial_end: Option<i64>,
}

/// What happens when a trial ends without a payment method: an invoice is
/// created and the subscription goes `past_due` instead of being canceled.
const MISSING_PAYMENT_METHOD_BEHAVIOR: &str = "create_invoice";

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    webhook_secret: Option<String>,
    base_url: String,
}

impl StripeClient {
    /// Stripe API base URL.
    pub const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    /// * `webhook_secret` - Optional webhook signing secret (whsec_...)
    ///
    /// # Errors
    ///
    /// Returns [`StripeError::Configuration`] if the key is blank or the HTTP
    /// client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        webhook_secret: Option<String>,
    ) -> Result<Self, StripeError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(StripeError::Configuration("Stripe API key is empty".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StripeError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            webhook_secret,
            base_url: Self::BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API root (a mock server in tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether a webhook signing secret is configured.
    #[must_use]
    pub fn has_webhook_secret(&self) -> bool {
        self.webhook_secret.is_some()
    }

    /// Get a customer by ID.
    ///
    /// Unknown and deleted customers both come back as `None`.
    pub async fn get_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<Customer>, StripeError> {
        let response = self
            .client
            .get(self.url(&format!("/customers/{customer_id}")))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let customer: Customer = self.handle_response(response).await?;
        Ok((!customer.deleted).then_some(customer))
    }

    /// Search for customers tagged with an account id.
    pub async fn search_customers_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<StripeList<Customer>, StripeError> {
        let query = account_search_query(account_id);

        let response = self
            .client
            .get(self.url("/customers/search"))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .query(&[("query", query.as_str()), ("limit", "1")])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Create a new Stripe customer tagged with an account id.
    ///
    /// # Arguments
    ///
    /// * `account_id` - Our internal account ID (stored as metadata)
    /// * `email` - Optional customer email
    pub async fn create_customer(
        &self,
        account_id: &AccountId,
        email: Option<&str>,
    ) -> Result<Customer, StripeError> {
        let mut params = vec![account_metadata_param("metadata", account_id)];

        if let Some(email) = email {
            params.push(("email".to_string(), email.to_string()));
        }

        let response = self
            .client
            .post(self.url("/customers"))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a subscription by ID, with its prices' products expanded.
    pub async fn get_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<Subscription>, StripeError> {
        let response = self
            .client
            .get(self.url(&format!("/subscriptions/{subscription_id}")))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .query(&[("expand[]", SUBSCRIPTION_PRODUCT_EXPANSION)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        self.handle_response(response).await.map(Some)
    }

    /// List a customer's subscriptions.
    ///
    /// Stripe omits canceled subscriptions from this listing by default. Products
    /// are not expanded: the listing's `data.` prefix would exceed Stripe's
    /// four-level expansion limit.
    ///
    /// # Arguments
    ///
    /// * `customer_id` - Stripe customer ID
    /// * `limit` - Maximum number of results (1-100)
    pub async fn list_subscriptions(
        &self,
        customer_id: &CustomerId,
        limit: Option<u32>,
    ) -> Result<StripeList<Subscription>, StripeError> {
        let limit = limit.unwrap_or(10).clamp(1, 100);

        let response = self
            .client
            .get(self.url("/subscriptions"))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .query(&[("customer", customer_id.as_str()), ("limit", &limit.to_string())])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Create a subscription for a customer.
    pub async fn create_subscription(
        &self,
        request: &NewSubscription<'_>,
    ) -> Result<Subscription, StripeError> {
        let mut params = vec![
            ("customer".to_string(), request.customer_id.to_string()),
            ("items[0][price]".to_string(), request.plan_id.to_string()),
            account_metadata_param("metadata", request.account_id),
            ("expand[]".to_string(), SUBSCRIPTION_PRODUCT_EXPANSION.to_string()),
        ];

        if let Some(trial_end) = request.trial_end {
            params.push(("trial_end".to_string(), trial_end.to_string()));
            params.push((
                "trial_settings[end_behavior][missing_payment_method]".to_string(),
                MISSING_PAYMENT_METHOD_BEHAVIOR.to_string(),
            ));
        }

        tracing::debug!(
            customer_id = %request.customer_id,
            plan_id = %request.plan_id,
            trial_end = ?request.trial_end,
            "Creating Stripe subscription"
        );

        let response = self
            .client
            .post(self.url("/subscriptions"))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Create a subscription-mode Checkout session.
    ///
    /// Promotion codes are allowed and automatic tax is enabled. A trial that
    /// ends without a payment method creates an invoice rather than blocking.
    pub async fn create_subscription_checkout(
        &self,
        request: &SubscriptionCheckout<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        let mut params = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("customer".to_string(), request.customer_id.to_string()),
            ("success_url".to_string(), request.success_url.to_string()),
            ("cancel_url".to_string(), request.cancel_url.to_string()),
            ("line_items[0][price]".to_string(), request.plan_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("allow_promotion_codes".to_string(), "true".to_string()),
            ("automatic_tax[enabled]".to_string(), "true".to_string()),
            (
                "subscription_data[trial_settings][end_behavior][missing_payment_method]"
                    .to_string(),
                MISSING_PAYMENT_METHOD_BEHAVIOR.to_string(),
            ),
            account_metadata_param("subscription_data[metadata]", request.account_id),
            account_metadata_param("metadata", request.account_id),
        ];

        if let Some(trial_end) = request.trial_end {
            params.push((
                "subscription_data[trial_end]".to_string(),
                trial_end.to_string(),
            ));
        }

        tracing::debug!(
            account_id = %request.account_id,
            customer_id = %request.customer_id,
            plan_id = %request.plan_id,
            trial_end = ?request.trial_end,
            "Creating Stripe checkout session"
        );

        let response = self
            .client
            .post(self.url("/checkout/sessions"))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Create a billing portal session.
    pub async fn create_billing_portal_session(
        &self,
        customer_id: &CustomerId,
        return_url: &str,
    ) -> Result<PortalSession, StripeError> {
        let params = [("customer", customer_id.as_str()), ("return_url", return_url)];

        let response = self
            .client
            .post(self.url("/billing_portal/sessions"))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List active recurring prices with their products expanded.
    pub async fn list_prices(&self) -> Result<StripeList<Price>, StripeError> {
        let response = self
            .client
            .get(self.url("/prices"))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .query(&[
                ("active", "true"),
                ("type", "recurring"),
                ("limit", "100"),
                ("expand[]", "data.product"),
            ])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Verify a webhook signature and parse the event.
    ///
    /// # Arguments
    ///
    /// * `payload` - Raw request body
    /// * `signature` - Value of the `Stripe-Signature` header
    /// * `tolerance_seconds` - Maximum accepted age of the signed timestamp
    /// * `now` - Current Unix time
    pub fn construct_event(
        &self,
        payload: &str,
        signature: &str,
        tolerance_seconds: i64,
        now: i64,
    ) -> Result<WebhookEvent, StripeError> {
        let secret = self
            .webhook_secret
            .as_ref()
            .ok_or_else(|| StripeError::Configuration("Webhook secret not configured".into()))?;

        webhook::verify_signature(secret, payload, signature, tolerance_seconds, now)?;

        Ok(serde_json::from_str(payload)?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            return Ok(serde_json::from_slice(&body)?);
        }

        // Try to parse error response
        let error_body: Result<StripeErrorResponse, _> = response.json().await;

        match error_body {
            Ok(stripe_error) => Err(StripeError::Api {
                status: status.as_u16(),
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(StripeError::Api {
                status: status.as_u16(),
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}

/// Search query matching customers tagged with `account_id`.
///
/// Single quotes in the id are escaped so the value cannot break out of the
/// quoted search term.
#[must_use]
pub fn account_search_query(account_id: &AccountId) -> String {
    let escaped = account_id.as_str().replace('\\', "\\\\").replace('\'', "\\'");
    format!("metadata['{ACCOUNT_ID_METADATA_KEY}']:'{escaped}'")
}

fn account_metadata_param(prefix: &str, account_id: &AccountId) -> (String, String) {
    (
        format!("{prefix}[{ACCOUNT_ID_METADATA_KEY}]"),
        account_id.to_string(),
    )
}
