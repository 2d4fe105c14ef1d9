//! The billing-provider capability.
//!
//! One implementation per provider. Callers hold an `Arc<dyn BillingProvider>`
//! and never see provider-specific shapes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::billing::{BillingStatus, Plan, ProviderKind, SessionUrl};
use crate::error::Result;
use crate::ids::{AccountId, CustomerId, PlanId, SubscriptionId};

/// Arguments for [`BillingProvider::get_billing_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingStatusArgs {
    /// Account to resolve billing for.
    pub account_id: AccountId,
    /// Known provider customer id, skips the customer search.
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    /// Email for a newly created customer.
    #[serde(default)]
    pub billing_email: Option<String>,
    /// Trial length for a newly created subscription.
    #[serde(default)]
    pub default_trial_days: Option<u32>,
    /// Plan for a newly created subscription.
    #[serde(default)]
    pub default_plan_id: Option<PlanId>,
    /// Known provider subscription id, skips the subscription listing.
    #[serde(default)]
    pub subscription_id: Option<SubscriptionId>,
}

impl BillingStatusArgs {
    /// Arguments carrying only the account id.
    #[must_use]
    pub fn for_account(account_id: AccountId) -> Self {
        Self {
            account_id,
            customer_id: None,
            billing_email: None,
            default_trial_days: None,
            default_plan_id: None,
            subscription_id: None,
        }
    }
}

/// Arguments for [`BillingProvider::get_new_subscription_url`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubscriptionArgs {
    /// Redirect target after a completed checkout.
    pub success_url: String,
    /// Redirect target after an abandoned checkout.
    pub cancel_url: String,
    /// Account the subscription is for.
    pub account_id: AccountId,
    /// Plan to subscribe to; falls back to the handler default.
    #[serde(default)]
    pub plan_id: Option<PlanId>,
    /// Email for a newly created customer.
    #[serde(default)]
    pub billing_email: Option<String>,
    /// Known provider customer id.
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
}

/// Arguments for [`BillingProvider::get_billing_portal_url`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPortalArgs {
    /// Where the portal's back link points.
    pub return_url: String,
    /// Provider customer whose billing is managed.
    pub customer_id: CustomerId,
}

/// Billing operations exposed to the edge functions.
///
/// Every method is a stateless composition of provider calls; errors from the
/// provider propagate unchanged.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Which provider this is.
    fn provider(&self) -> ProviderKind;

    /// List purchasable plans.
    async fn get_plans(&self) -> Result<Vec<Plan>>;

    /// Find or create the account's customer, then its subscription.
    async fn get_billing_status(&self, args: BillingStatusArgs) -> Result<BillingStatus>;

    /// Create a hosted checkout page that starts a subscription.
    async fn get_new_subscription_url(&self, args: NewSubscriptionArgs) -> Result<SessionUrl>;

    /// Create a hosted self-service billing page.
    async fn get_billing_portal_url(&self, args: BillingPortalArgs) -> Result<SessionUrl>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BillingError;

    struct NoCustomers;

    #[async_trait]
    impl BillingProvider for NoCustomers {
        fn provider(&self) -> ProviderKind {
            ProviderKind::Stripe
        }

        async fn get_plans(&self) -> Result<Vec<Plan>> {
            Ok(Vec::new())
        }

        async fn get_billing_status(&self, _args: BillingStatusArgs) -> Result<BillingStatus> {
            Ok(BillingStatus::no_customer(self.provider()))
        }

        async fn get_new_subscription_url(&self, _args: NewSubscriptionArgs) -> Result<SessionUrl> {
            Err(BillingError::validation("customer not found"))
        }

        async fn get_billing_portal_url(&self, args: BillingPortalArgs) -> Result<SessionUrl> {
            Err(BillingError::not_found("customer", args.customer_id.as_str()))
        }
    }

    #[tokio::test]
    async fn trait_objects_are_usable() {
        let provider: std::sync::Arc<dyn BillingProvider> = std::sync::Arc::new(NoCustomers);
        let account: AccountId = "acct_1".parse().unwrap();

        let status = provider
            .get_billing_status(BillingStatusArgs::for_account(account))
            .await
            .unwrap();
        assert!(status.customer.is_none());
        assert!(status.subscription.is_none());
        assert_eq!(status.provider, ProviderKind::Stripe);
    }

    #[test]
    fn status_args_accept_missing_optionals() {
        let args: BillingStatusArgs =
            serde_json::from_value(serde_json::json!({ "account_id": "acct_1" })).unwrap();
        assert_eq!(args, BillingStatusArgs::for_account("acct_1".parse().unwrap()));
    }
}
