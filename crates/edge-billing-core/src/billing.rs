//! Internal billing shapes.
//!
//! These are the fixed shapes every provider adapter maps onto. They mirror
//! upstream records but are owned by nobody locally: each one is recomputed
//! from the provider on every request.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, CustomerId, PlanId, SubscriptionId};

/// Metadata key under which created upstream records carry the account id.
pub const ACCOUNT_ID_METADATA_KEY: &str = "basejump_account_id";

/// The billing provider behind a [`crate::BillingProvider`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Stripe.
    Stripe,
}

impl ProviderKind {
    /// Wire name of the provider.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A billable party as known to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingCustomer {
    /// Provider customer id.
    pub id: CustomerId,
    /// Billing email, if the provider has one.
    pub email: Option<String>,
    /// Account this customer is tagged with, if any.
    pub account_id: Option<AccountId>,
    /// Provider that owns the record.
    pub provider: ProviderKind,
}

/// Subscription status as reported by the provider.
///
/// Transitions (trialing -> active -> `past_due` -> canceled, ...) happen
/// upstream only; this crate never changes a status itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// In a trial period.
    Trialing,
    /// Paid and current.
    Active,
    /// Latest invoice unpaid, still retrying.
    PastDue,
    /// Retries exhausted, not canceled.
    Unpaid,
    /// Canceled.
    Canceled,
    /// First payment not yet completed.
    Incomplete,
    /// First payment never completed.
    IncompleteExpired,
    /// Paused (trial ended without a payment method).
    Paused,
    /// A status this crate does not know about.
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    /// Whether a subscription in this status counts as the account's current one.
    #[must_use]
    pub const fn is_current(self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Unpaid => "unpaid",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Paused => "paused",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plan enrollment as known to the provider.
///
/// Timestamps are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSubscription {
    /// Provider subscription id.
    pub id: SubscriptionId,
    /// Customer the subscription belongs to.
    pub customer_id: CustomerId,
    /// Account this subscription is tagged with, if any.
    pub account_id: Option<AccountId>,
    /// Current status.
    pub status: SubscriptionStatus,
    /// Plan/price of the first subscription item.
    pub plan_id: Option<PlanId>,
    /// Human-readable plan name, when the provider exposes one.
    pub plan_name: Option<String>,
    /// Quantity of the first subscription item.
    pub quantity: Option<u64>,
    /// Whether the subscription ends at the close of the current period.
    pub cancel_at_period_end: bool,
    /// Creation time.
    pub created: i64,
    /// Start of the current billing period.
    pub current_period_start: Option<i64>,
    /// End of the current billing period.
    pub current_period_end: Option<i64>,
    /// Trial start.
    pub trial_start: Option<i64>,
    /// Trial end.
    pub trial_end: Option<i64>,
    /// Scheduled cancellation time.
    pub cancel_at: Option<i64>,
    /// When cancellation was requested.
    pub canceled_at: Option<i64>,
    /// When the subscription ended.
    pub ended_at: Option<i64>,
    /// Raw provider metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Provider that owns the record.
    pub provider: ProviderKind,
}

/// A purchasable recurring plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan/price id.
    pub id: PlanId,
    /// Display name.
    pub name: String,
    /// Description, if any.
    pub description: Option<String>,
    /// Price per interval in the currency's minor unit.
    pub amount: Option<i64>,
    /// ISO currency code, lowercase.
    pub currency: String,
    /// Billing interval (`day`, `week`, `month`, `year`).
    pub interval: Option<String>,
    /// Number of intervals between bills.
    pub interval_count: Option<u32>,
    /// Trial days configured on the plan itself.
    pub trial_period_days: Option<u32>,
    /// Whether the plan can be purchased.
    pub active: bool,
    /// Raw provider metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Composed billing view for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingStatus {
    /// Provider that answered.
    pub provider: ProviderKind,
    /// The resolved customer; `None` when none could be found or created.
    pub customer: Option<BillingCustomer>,
    /// The resolved subscription; `None` when none exists and none was created.
    pub subscription: Option<BillingSubscription>,
}

impl BillingStatus {
    /// Status with neither customer nor subscription.
    #[must_use]
    pub const fn no_customer(provider: ProviderKind) -> Self {
        Self {
            provider,
            customer: None,
            subscription: None,
        }
    }
}

/// A hosted provider page (checkout or billing portal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUrl {
    /// Where to send the user.
    pub url: String,
}
