//! Request and response types for the billing-functions client.

use serde::{Deserialize, Serialize};

use edge_billing_core::{AccountId, PlanId, SubscriptionId, SubscriptionStatus};

pub use edge_billing_core::{Plan, SessionUrl};

/// Envelope posted to the billing-functions endpoint.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct FunctionCall<A> {
    pub action: &'static str,
    pub args: A,
}

/// Arguments naming only an account.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AccountArgs<'a> {
    pub account_id: &'a AccountId,
}

/// Empty argument object.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct NoArgs {}

/// Request for a subscription checkout URL.
#[derive(Debug, Clone, Serialize)]
pub struct NewSubscriptionRequest {
    /// Account to subscribe.
    pub account_id: AccountId,
    /// Redirect target after a completed checkout.
    pub success_url: String,
    /// Redirect target after an abandoned checkout.
    pub cancel_url: String,
    /// Plan to subscribe to; the server default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<PlanId>,
}

/// Request for a billing portal URL.
#[derive(Debug, Clone, Serialize)]
pub struct PortalRequest {
    /// Account whose customer opens the portal.
    pub account_id: AccountId,
    /// Where the portal's back link points.
    pub return_url: String,
}

/// The caller's role on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    /// May manage billing.
    Owner,
    /// May view billing.
    Member,
}

/// Billing status of an account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BillingStatusResponse {
    /// Current subscription id.
    #[serde(default)]
    pub subscription_id: Option<SubscriptionId>,
    /// Whether the subscription is active or trialing.
    #[serde(default)]
    pub subscription_active: bool,
    /// Subscription status.
    #[serde(default)]
    pub status: Option<SubscriptionStatus>,
    /// Email billed.
    #[serde(default)]
    pub billing_email: Option<String>,
    /// Name of the subscribed plan.
    #[serde(default)]
    pub plan_name: Option<String>,
    /// The caller's role on the account.
    pub account_role: AccountRole,
    /// Whether the caller is the primary owner.
    #[serde(default)]
    pub is_primary_owner: bool,
    /// Whether billing is enabled.
    #[serde(default)]
    pub billing_enabled: bool,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub code: String,
    pub message: String,
}
