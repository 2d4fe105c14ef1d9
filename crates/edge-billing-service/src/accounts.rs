//! Account directory: who may bill an account, and where its billing record lives.
//!
//! The directory is the application's database, reached through PostgREST RPC
//! functions. Reads run with the caller's own token so row-level security
//! decides access; writes run with the service-role key.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use edge_billing_core::{
    AccountId, BillingCustomer, BillingSubscription, CustomerId, ProviderKind, SubscriptionId,
    SubscriptionStatus,
};

/// RPC returning an account's billing info for the calling user.
const BILLING_STATUS_RPC: &str = "get_account_billing_status";

/// RPC persisting a customer and subscription for an account.
const UPSERT_RPC: &str = "service_role_upsert_customer_subscription";

/// Error type for directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The directory refused the request (no access, unknown account).
    #[error("directory denied request: {status} - {message}")]
    Denied {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// The directory failed.
    #[error("directory error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// A member's role on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    /// May manage billing.
    Owner,
    /// May view billing.
    Member,
}

/// Billing info for one account, as seen by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBillingInfo {
    /// The account.
    pub account_id: AccountId,
    /// The caller's role on the account.
    pub account_role: AccountRole,
    /// Whether the caller is the account's primary owner.
    #[serde(default)]
    pub is_primary_owner: bool,
    /// Whether the account is a personal account.
    #[serde(default)]
    pub is_personal_account: bool,
    /// Whether billing is enabled at all.
    #[serde(default)]
    pub billing_enabled: bool,
    /// Last known subscription status.
    #[serde(default)]
    pub billing_status: Option<SubscriptionStatus>,
    /// Stored provider customer id.
    #[serde(default)]
    pub billing_customer_id: Option<CustomerId>,
    /// Stored provider subscription id.
    #[serde(default)]
    pub billing_subscription_id: Option<SubscriptionId>,
    /// Email to bill.
    #[serde(default)]
    pub billing_email: Option<String>,
    /// Provider the stored ids belong to.
    #[serde(default)]
    pub billing_provider: Option<String>,
}

/// Lookup and persistence of account billing records.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Billing info for `account_id`, evaluated with the caller's token.
    async fn billing_info(
        &self,
        user_token: &str,
        account_id: &AccountId,
    ) -> Result<AccountBillingInfo, DirectoryError>;

    /// Persist the resolved customer and subscription for an account.
    async fn upsert_customer_subscription(
        &self,
        account_id: &AccountId,
        customer: Option<&BillingCustomer>,
        subscription: Option<&BillingSubscription>,
    ) -> Result<(), DirectoryError>;
}

/// Customer row as the upsert RPC expects it.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerRecord {
    /// Provider customer id.
    pub id: String,
    /// Billing email.
    pub billing_email: Option<String>,
    /// Provider name.
    pub provider: ProviderKind,
}

impl From<&BillingCustomer> for CustomerRecord {
    fn from(customer: &BillingCustomer) -> Self {
        Self {
            id: customer.id.to_string(),
            billing_email: customer.email.clone(),
            provider: customer.provider,
        }
    }
}

/// Subscription row as the upsert RPC expects it; timestamps are RFC 3339.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRecord {
    /// Provider subscription id.
    pub id: String,
    /// Status.
    pub status: SubscriptionStatus,
    /// Plan name.
    pub plan_name: Option<String>,
    /// Price id.
    pub price_id: Option<String>,
    /// Quantity.
    pub quantity: Option<u64>,
    /// Cancels at period end.
    pub cancel_at_period_end: bool,
    /// Creation time.
    pub created: Option<String>,
    /// Current period start.
    pub current_period_start: Option<String>,
    /// Current period end.
    pub current_period_end: Option<String>,
    /// End time.
    pub ended_at: Option<String>,
    /// Scheduled cancellation.
    pub cancel_at: Option<String>,
    /// Cancellation request time.
    pub canceled_at: Option<String>,
    /// Trial start.
    pub trial_start: Option<String>,
    /// Trial end.
    pub trial_end: Option<String>,
    /// Provider metadata.
    pub metadata: HashMap<String, String>,
    /// Provider name.
    pub provider: ProviderKind,
}

impl From<&BillingSubscription> for SubscriptionRecord {
    fn from(subscription: &BillingSubscription) -> Self {
        Self {
            id: subscription.id.to_string(),
            status: subscription.status,
            plan_name: subscription.plan_name.clone(),
            price_id: subscription.plan_id.as_ref().map(ToString::to_string),
            quantity: subscription.quantity,
            cancel_at_period_end: subscription.cancel_at_period_end,
            created: rfc3339(Some(subscription.created)),
            current_period_start: rfc3339(subscription.current_period_start),
            current_period_end: rfc3339(subscription.current_period_end),
            ended_at: rfc3339(subscription.ended_at),
            cancel_at: rfc3339(subscription.cancel_at),
            canceled_at: rfc3339(subscription.canceled_at),
            trial_start: rfc3339(subscription.trial_start),
            trial_end: rfc3339(subscription.trial_end),
            metadata: subscription.metadata.clone(),
            provider: subscription.provider,
        }
    }
}

fn rfc3339(seconds: Option<i64>) -> Option<String> {
    seconds
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .map(|dt| dt.to_rfc3339())
}

#[derive(Debug, Serialize)]
struct BillingInfoParams<'a> {
    account_id: &'a AccountId,
}

#[derive(Debug, Serialize)]
struct UpsertParams<'a> {
    account_id: &'a AccountId,
    customer: Option<CustomerRecord>,
    subscription: Option<SubscriptionRecord>,
}

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    message: String,
}

/// [`AccountDirectory`] over PostgREST RPC.
#[derive(Debug, Clone)]
pub struct PostgrestDirectory {
    client: Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl PostgrestDirectory {
    /// Create a directory client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Project URL; RPCs live under `/rest/v1/rpc/`
    /// * `anon_key` - Public API key sent with user-scoped reads
    /// * `service_role_key` - Privileged key used for writes
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Configuration`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        service_role_key: impl Into<String>,
    ) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DirectoryError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            service_role_key: service_role_key.into(),
        })
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{function}", self.base_url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, DirectoryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<PostgrestError>()
            .await
            .map(|e| e.message)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("HTTP {status}"));

        if status.is_client_error() {
            Err(DirectoryError::Denied {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(DirectoryError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl AccountDirectory for PostgrestDirectory {
    async fn billing_info(
        &self,
        user_token: &str,
        account_id: &AccountId,
    ) -> Result<AccountBillingInfo, DirectoryError> {
        let response = self
            .client
            .post(self.rpc_url(BILLING_STATUS_RPC))
            .header("apikey", &self.anon_key)
            .bearer_auth(user_token)
            .json(&BillingInfoParams { account_id })
            .send()
            .await?;

        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn upsert_customer_subscription(
        &self,
        account_id: &AccountId,
        customer: Option<&BillingCustomer>,
        subscription: Option<&BillingSubscription>,
    ) -> Result<(), DirectoryError> {
        let params = UpsertParams {
            account_id,
            customer: customer.map(CustomerRecord::from),
            subscription: subscription.map(SubscriptionRecord::from),
        };

        let response = self
            .client
            .post(self.rpc_url(UPSERT_RPC))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .json(&params)
            .send()
            .await?;

        Self::check(response).await?;

        tracing::debug!(
            account_id = %account_id,
            customer = ?params.customer.as_ref().map(|c| &c.id),
            subscription = ?params.subscription.as_ref().map(|s| &s.id),
            "Billing record upserted"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn billing_info_parses_rpc_payload() {
        let info: AccountBillingInfo = serde_json::from_value(json!({
            "account_id": "acct_1",
            "account_role": "owner",
            "is_primary_owner": true,
            "billing_enabled": true,
            "billing_status": "trialing",
            "billing_customer_id": "cus_1",
            "billing_subscription_id": null,
            "billing_email": "a@b.com"
        }))
        .unwrap();

        assert_eq!(info.account_role, AccountRole::Owner);
        assert_eq!(info.billing_customer_id.unwrap().as_str(), "cus_1");
        assert!(info.billing_subscription_id.is_none());
        assert_eq!(info.billing_status, Some(SubscriptionStatus::Trialing));
    }

    #[test]
    fn subscription_record_uses_rfc3339() {
        let subscription = BillingSubscription {
            id: "sub_1".parse().unwrap(),
            customer_id: "cus_1".parse().unwrap(),
            account_id: None,
            status: SubscriptionStatus::Active,
            plan_id: Some("price_1".parse().unwrap()),
            plan_name: Some("Pro".into()),
            quantity: Some(1),
            cancel_at_period_end: false,
            created: 0,
            current_period_start: None,
            current_period_end: Some(86_400),
            trial_start: None,
            trial_end: None,
            cancel_at: None,
            canceled_at: None,
            ended_at: None,
            metadata: HashMap::new(),
            provider: ProviderKind::Stripe,
        };

        let record = SubscriptionRecord::from(&subscription);
        assert_eq!(record.created.as_deref(), Some("1970-01-01T00:00:00+00:00"));
        assert_eq!(
            record.current_period_end.as_deref(),
            Some("1970-01-02T00:00:00+00:00")
        );
        assert_eq!(record.price_id.as_deref(), Some("price_1"));
        assert!(record.trial_end.is_none());
    }

    #[test]
    fn rpc_urls_are_rooted_at_rest() {
        let directory = PostgrestDirectory::new("http://db.local/", "anon", "service").unwrap();
        assert_eq!(
            directory.rpc_url(BILLING_STATUS_RPC),
            "http://db.local/rest/v1/rpc/get_account_billing_status"
        );
    }
}
