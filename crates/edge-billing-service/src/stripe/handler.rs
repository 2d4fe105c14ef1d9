//! The Stripe implementation of [`BillingProvider`].

use std::sync::Arc;

use async_trait::async_trait;

use edge_billing_core::{
    trial_end, BillingError, BillingPortalArgs, BillingProvider, BillingStatus, BillingStatusArgs,
    Clock, NewSubscriptionArgs, Plan, PlanId, ProviderKind, SessionUrl, SystemClock,
};

use super::client::{StripeClient, SubscriptionCheckout};
use super::customer::find_or_create_customer;
use super::subscription::{find_or_create_subscription, SubscriptionLookup};

/// Defaults applied when a request does not name a plan or trial length.
#[derive(Debug, Clone, Default)]
pub struct HandlerDefaults {
    /// Trial length for new subscriptions.
    pub default_trial_days: Option<u32>,
    /// Plan for new subscriptions.
    pub default_plan_id: Option<PlanId>,
}

/// Billing functions backed by Stripe.
///
/// Holds the shared client handle; every call is otherwise stateless.
#[derive(Clone)]
pub struct StripeFunctionHandler {
    client: Arc<StripeClient>,
    defaults: HandlerDefaults,
    clock: Arc<dyn Clock>,
}

impl StripeFunctionHandler {
    /// Create a handler over an existing client.
    #[must_use]
    pub fn new(client: Arc<StripeClient>, defaults: HandlerDefaults) -> Self {
        Self {
            client,
            defaults,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for trial-end timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The handler's defaults.
    #[must_use]
    pub fn defaults(&self) -> &HandlerDefaults {
        &self.defaults
    }
}

#[async_trait]
impl BillingProvider for StripeFunctionHandler {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Stripe
    }

    async fn get_plans(&self) -> Result<Vec<Plan>, BillingError> {
        let prices = self.client.list_prices().await?;
        prices.data.iter().map(|price| price.to_plan()).collect()
    }

    async fn get_billing_status(&self, args: BillingStatusArgs) -> Result<BillingStatus, BillingError> {
        let Some(customer) = find_or_create_customer(
            &self.client,
            &args.account_id,
            args.customer_id.as_ref(),
            args.billing_email.as_deref(),
        )
        .await?
        else {
            return Ok(BillingStatus::no_customer(self.provider()));
        };

        let default_plan_id = args
            .default_plan_id
            .as_ref()
            .or(self.defaults.default_plan_id.as_ref());

        let lookup = SubscriptionLookup {
            customer_id: &customer.value.id,
            subscription_id: args.subscription_id.as_ref(),
            default_plan_id,
            account_id: &args.account_id,
            default_trial_days: args
                .default_trial_days
                .or(self.defaults.default_trial_days),
            now: self.clock.now(),
        };

        let subscription = match find_or_create_subscription(&self.client, &lookup).await {
            Ok(subscription) => subscription,
            Err(e) => {
                if customer.created {
                    // Not rolled back; left for out-of-band reconciliation.
                    tracing::warn!(
                        account_id = %args.account_id,
                        customer_id = %customer.value.id,
                        error = %e,
                        "Subscription resolution failed after creating a customer; customer left in place"
                    );
                }
                return Err(e);
            }
        };

        Ok(BillingStatus {
            provider: self.provider(),
            customer: Some(customer.value),
            subscription: subscription.map(|s| s.value),
        })
    }

    async fn get_new_subscription_url(
        &self,
        args: NewSubscriptionArgs,
    ) -> Result<SessionUrl, BillingError> {
        let customer = find_or_create_customer(
            &self.client,
            &args.account_id,
            args.customer_id.as_ref(),
            args.billing_email.as_deref(),
        )
        .await?
        .ok_or_else(|| BillingError::validation("Customer not found"))?;

        let plan_id = args
            .plan_id
            .as_ref()
            .or(self.defaults.default_plan_id.as_ref())
            .ok_or_else(|| BillingError::validation("No plan selected and no default plan"))?;

        let session = self
            .client
            .create_subscription_checkout(&SubscriptionCheckout {
                customer_id: &customer.value.id,
                account_id: &args.account_id,
                plan_id,
                trial_end: trial_end(self.defaults.default_trial_days, self.clock.now()),
                success_url: &args.success_url,
                cancel_url: &args.cancel_url,
            })
            .await?;

        tracing::info!(
            account_id = %args.account_id,
            customer_id = %customer.value.id,
            session_id = %session.id,
            "Stripe checkout session created"
        );

        let url = session.url.filter(|u| !u.is_empty()).ok_or_else(|| {
            BillingError::UnexpectedResponse(format!("checkout session {} has no url", session.id))
        })?;

        Ok(SessionUrl { url })
    }

    async fn get_billing_portal_url(
        &self,
        args: BillingPortalArgs,
    ) -> Result<SessionUrl, BillingError> {
        let session = self
            .client
            .create_billing_portal_session(&args.customer_id, &args.return_url)
            .await?;

        tracing::info!(
            customer_id = %args.customer_id,
            session_id = %session.id,
            "Stripe billing portal session created"
        );

        Ok(SessionUrl { url: session.url })
    }
}
