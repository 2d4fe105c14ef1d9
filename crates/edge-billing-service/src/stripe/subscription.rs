//! Find-or-create for Stripe subscriptions.

use chrono::{DateTime, Utc};

use edge_billing_core::{
    trial_end, AccountId, BillingError, BillingSubscription, CustomerId, PlanId, SubscriptionId,
};

use super::client::{NewSubscription, StripeClient};
use super::customer::Resolved;
use super::types::Subscription;

/// How many of a customer's subscriptions are inspected for a current one.
const LIST_LIMIT: u32 = 10;

/// Inputs for [`find_or_create_subscription`].
#[derive(Debug, Clone)]
pub struct SubscriptionLookup<'a> {
    /// Customer the subscription must belong to.
    pub customer_id: &'a CustomerId,
    /// Known subscription id; skips the listing.
    pub subscription_id: Option<&'a SubscriptionId>,
    /// Plan for a newly created subscription.
    pub default_plan_id: Option<&'a PlanId>,
    /// Account to tag a newly created subscription with.
    pub account_id: &'a AccountId,
    /// Trial length for a newly created subscription.
    pub default_trial_days: Option<u32>,
    /// Current time, for the trial end.
    pub now: DateTime<Utc>,
}

/// Resolve the subscription for an already-resolved customer.
///
/// 1. An explicit `subscription_id` is retrieved directly; an unknown id is
///    [`BillingError::NotFound`].
/// 2. Otherwise the first of the customer's subscriptions that is `active` or
///    `trialing` is returned.
/// 3. Otherwise one is created on `default_plan_id`, with a trial ending
///    `default_trial_days` from `now`. Without a default plan nothing is
///    created and the result is `None`.
///
/// At most one create call is made; a failed create is returned as-is.
pub async fn find_or_create_subscription(
    client: &StripeClient,
    lookup: &SubscriptionLookup<'_>,
) -> Result<Option<Resolved<BillingSubscription>>, BillingError> {
    if let Some(subscription_id) = lookup.subscription_id {
        let subscription = client
            .get_subscription(subscription_id)
            .await?
            .ok_or_else(|| BillingError::not_found("subscription", subscription_id.as_str()))?;

        return Ok(Some(Resolved::found(subscription.to_billing()?)));
    }

    let listed = client
        .list_subscriptions(lookup.customer_id, Some(LIST_LIMIT))
        .await?;

    if let Some(current) = listed.data.into_iter().find(|s| s.status.is_current()) {
        tracing::debug!(
            customer_id = %lookup.customer_id,
            subscription_id = %current.id,
            status = %current.status,
            "Found current Stripe subscription"
        );
        let current = with_product_name(client, current).await?;
        return Ok(Some(Resolved::found(current.to_billing()?)));
    }

    let Some(plan_id) = lookup.default_plan_id else {
        tracing::info!(
            customer_id = %lookup.customer_id,
            "No current subscription and no default plan to create one"
        );
        return Ok(None);
    };

    let subscription = client
        .create_subscription(&NewSubscription {
            customer_id: lookup.customer_id,
            account_id: lookup.account_id,
            plan_id,
            trial_end: trial_end(lookup.default_trial_days, lookup.now),
        })
        .await?;

    tracing::info!(
        account_id = %lookup.account_id,
        customer_id = %lookup.customer_id,
        subscription_id = %subscription.id,
        status = %subscription.status,
        "Stripe subscription created"
    );

    Ok(Some(Resolved::created(subscription.to_billing()?)))
}

/// Re-read a subscription whose product was not expanded, so its plan name is
/// the product name. Falls back to the subscription as given.
async fn with_product_name(
    client: &StripeClient,
    subscription: Subscription,
) -> Result<Subscription, BillingError> {
    if subscription.has_product_name() {
        return Ok(subscription);
    }

    let id = SubscriptionId::new(subscription.id.as_str())?;
    Ok(client.get_subscription(&id).await?.unwrap_or(subscription))
}
