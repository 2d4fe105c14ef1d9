//! Stripe API types.
//!
//! Only the fields the billing functions read are modelled; everything else in
//! Stripe's payloads is ignored on deserialization.

use std::collections::HashMap;

use serde::Deserialize;

use edge_billing_core::{
    AccountId, BillingCustomer, BillingError, BillingSubscription, CustomerId, Plan, PlanId,
    ProviderKind, SubscriptionId, SubscriptionStatus, ACCOUNT_ID_METADATA_KEY,
};

/// A field Stripe returns either as an id or, when expanded, as the full object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    /// Unexpanded: just the id.
    Id(String),
    /// Expanded object.
    Object(Box<T>),
}

/// A Stripe object with an id.
pub trait StripeObject {
    /// The object's id.
    fn object_id(&self) -> &str;
}

impl<T: StripeObject> Expandable<T> {
    /// The referenced object's id, whether expanded or not.
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Object(object) => object.object_id(),
        }
    }

    /// The expanded object, if present.
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Self::Id(_) => None,
            Self::Object(object) => Some(object),
        }
    }
}

impl StripeObject for Customer {
    fn object_id(&self) -> &str {
        &self.id
    }
}

impl StripeObject for Product {
    fn object_id(&self) -> &str {
        &self.id
    }
}

impl StripeObject for Subscription {
    fn object_id(&self) -> &str {
        &self.id
    }
}

/// Stripe customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    /// Stripe customer ID.
    pub id: String,
    /// Customer email.
    #[serde(default)]
    pub email: Option<String>,
    /// Customer name.
    #[serde(default)]
    pub name: Option<String>,
    /// Metadata attached to the customer.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
    /// Set on the stub Stripe returns for a deleted customer.
    #[serde(default)]
    pub deleted: bool,
}

impl Customer {
    /// Account id from the customer's metadata, if tagged.
    #[must_use]
    pub fn account_id(&self) -> Option<AccountId> {
        account_id_from(&self.metadata)
    }

    /// Map onto the internal customer shape.
    ///
    /// # Errors
    ///
    /// Fails if Stripe returned a blank id.
    pub fn to_billing(&self) -> Result<BillingCustomer, BillingError> {
        Ok(BillingCustomer {
            id: CustomerId::new(self.id.as_str())?,
            email: self.email.clone(),
            account_id: self.account_id(),
            provider: ProviderKind::Stripe,
        })
    }
}

/// Stripe product object.
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the product is available.
    #[serde(default)]
    pub active: bool,
    /// Metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Recurring component of a price.
#[derive(Debug, Clone, Deserialize)]
pub struct Recurring {
    /// Billing interval (`day`, `week`, `month`, `year`).
    pub interval: String,
    /// Intervals between bills.
    #[serde(default)]
    pub interval_count: Option<u32>,
    /// Trial days configured on the price.
    #[serde(default)]
    pub trial_period_days: Option<u32>,
}

/// Stripe price object.
#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    /// Price ID.
    pub id: String,
    /// Whether the price can be used for new purchases.
    #[serde(default)]
    pub active: bool,
    /// Currency (e.g., "usd").
    #[serde(default)]
    pub currency: String,
    /// Amount in the currency's minor unit.
    #[serde(default)]
    pub unit_amount: Option<i64>,
    /// Internal nickname.
    #[serde(default)]
    pub nickname: Option<String>,
    /// Owning product.
    #[serde(default)]
    pub product: Option<Expandable<Product>>,
    /// Recurring details, absent for one-time prices.
    #[serde(default)]
    pub recurring: Option<Recurring>,
    /// Metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Price {
    /// Best display name: product name, then nickname, then the price id.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.product
            .as_ref()
            .and_then(Expandable::as_object)
            .map(|product| product.name.clone())
            .filter(|name| !name.is_empty())
            .or_else(|| self.nickname.clone())
            .unwrap_or_else(|| self.id.clone())
    }

    /// Map onto the internal plan shape.
    ///
    /// # Errors
    ///
    /// Fails if Stripe returned a blank id.
    pub fn to_plan(&self) -> Result<Plan, BillingError> {
        let product = self.product.as_ref().and_then(Expandable::as_object);

        Ok(Plan {
            id: PlanId::new(self.id.as_str())?,
            name: self.display_name(),
            description: product.and_then(|p| p.description.clone()),
            amount: self.unit_amount,
            currency: self.currency.clone(),
            interval: self.recurring.as_ref().map(|r| r.interval.clone()),
            interval_count: self.recurring.as_ref().and_then(|r| r.interval_count),
            trial_period_days: self.recurring.as_ref().and_then(|r| r.trial_period_days),
            active: self.active,
            metadata: self.metadata.clone(),
        })
    }
}

/// One line of a subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    /// Item ID.
    pub id: String,
    /// Price being billed.
    #[serde(default)]
    pub price: Option<Price>,
    /// Quantity.
    #[serde(default)]
    pub quantity: Option<u64>,
    /// Period start (newer API versions report periods per item).
    #[serde(default)]
    pub current_period_start: Option<i64>,
    /// Period end (newer API versions report periods per item).
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

/// Stripe subscription object.
#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    /// Subscription ID.
    pub id: String,
    /// Owning customer.
    pub customer: Expandable<Customer>,
    /// Status.
    pub status: SubscriptionStatus,
    /// Subscription items.
    #[serde(default = "StripeList::empty")]
    pub items: StripeList<SubscriptionItem>,
    /// Whether the subscription ends at the close of the current period.
    #[serde(default)]
    pub cancel_at_period_end: bool,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
    /// Current period start.
    #[serde(default)]
    pub current_period_start: Option<i64>,
    /// Current period end.
    #[serde(default)]
    pub current_period_end: Option<i64>,
    /// Trial start.
    #[serde(default)]
    pub trial_start: Option<i64>,
    /// Trial end.
    #[serde(default)]
    pub trial_end: Option<i64>,
    /// Scheduled cancellation.
    #[serde(default)]
    pub cancel_at: Option<i64>,
    /// When cancellation was requested.
    #[serde(default)]
    pub canceled_at: Option<i64>,
    /// When the subscription ended.
    #[serde(default)]
    pub ended_at: Option<i64>,
    /// Metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Subscription {
    /// Account id from the subscription's metadata, if tagged.
    #[must_use]
    pub fn account_id(&self) -> Option<AccountId> {
        account_id_from(&self.metadata)
    }

    /// Whether the plan name can be read from an expanded product.
    ///
    /// `true` also when there is no price to name. Webhook payloads and
    /// subscription listings carry unexpanded products.
    #[must_use]
    pub fn has_product_name(&self) -> bool {
        self.items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .and_then(|price| price.product.as_ref())
            .map_or(true, |product| product.as_object().is_some())
    }

    /// Map onto the internal subscription shape.
    ///
    /// # Errors
    ///
    /// Fails if Stripe returned a blank subscription or customer id.
    pub fn to_billing(&self) -> Result<BillingSubscription, BillingError> {
        let item = self.items.data.first();
        let price = item.and_then(|i| i.price.as_ref());

        Ok(BillingSubscription {
            id: SubscriptionId::new(self.id.as_str())?,
            customer_id: CustomerId::new(self.customer.id())?,
            account_id: self.account_id(),
            status: self.status,
            plan_id: price.and_then(|p| PlanId::new(p.id.as_str()).ok()),
            plan_name: price.map(Price::display_name),
            quantity: item.and_then(|i| i.quantity),
            cancel_at_period_end: self.cancel_at_period_end,
            created: self.created,
            current_period_start: self
                .current_period_start
                .or_else(|| item.and_then(|i| i.current_period_start)),
            current_period_end: self
                .current_period_end
                .or_else(|| item.and_then(|i| i.current_period_end)),
            trial_start: self.trial_start,
            trial_end: self.trial_end,
            cancel_at: self.cancel_at,
            canceled_at: self.canceled_at,
            ended_at: self.ended_at,
            metadata: self.metadata.clone(),
            provider: ProviderKind::Stripe,
        })
    }
}

/// Stripe Checkout session object.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session ID.
    pub id: String,
    /// Checkout URL to redirect the user to.
    #[serde(default)]
    pub url: Option<String>,
    /// Session mode (`payment`, `subscription`, `setup`).
    #[serde(default)]
    pub mode: Option<String>,
    /// Payment status.
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Session status.
    #[serde(default)]
    pub status: Option<String>,
    /// Customer.
    #[serde(default)]
    pub customer: Option<Expandable<Customer>>,
    /// Subscription created by the session.
    #[serde(default)]
    pub subscription: Option<Expandable<Subscription>>,
    /// Metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// Account id from the session's metadata, if tagged.
    #[must_use]
    pub fn account_id(&self) -> Option<AccountId> {
        account_id_from(&self.metadata)
    }
}

/// Stripe billing portal session object.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalSession {
    /// Session ID.
    pub id: String,
    /// Portal URL to redirect the user to.
    pub url: String,
    /// Customer the portal manages.
    #[serde(default)]
    pub customer: Option<String>,
    /// Return URL.
    #[serde(default)]
    pub return_url: Option<String>,
}

/// Stripe list and search response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    /// Object type (`list` or `search_result`).
    #[serde(default)]
    pub object: String,
    /// Data items.
    pub data: Vec<T>,
    /// Whether there are more items.
    #[serde(default)]
    pub has_more: bool,
    /// URL for the list endpoint.
    #[serde(default)]
    pub url: Option<String>,
}

impl<T> StripeList<T> {
    /// An empty list.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            object: "list".to_string(),
            data: Vec::new(),
            has_more: false,
            url: None,
        }
    }
}

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
    /// Whether the event came from live mode.
    #[serde(default)]
    pub livemode: bool,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object.
    pub object: serde_json::Value,
}

/// Stripe API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Parameter that caused the error.
    #[serde(default)]
    pub param: Option<String>,
}

fn account_id_from(metadata: &HashMap<String, String>) -> Option<AccountId> {
    metadata
        .get(ACCOUNT_ID_METADATA_KEY)
        .and_then(|value| AccountId::new(value.as_str()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn customer_reads_account_metadata() {
        let customer: Customer = serde_json::from_value(json!({
            "id": "cus_123",
            "email": "a@b.com",
            "metadata": { "basejump_account_id": "acct_1" }
        }))
        .unwrap();

        let billing = customer.to_billing().unwrap();
        assert_eq!(billing.id.as_str(), "cus_123");
        assert_eq!(billing.account_id.unwrap().as_str(), "acct_1");
        assert_eq!(billing.email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn deleted_customer_stub_parses() {
        let customer: Customer =
            serde_json::from_value(json!({ "id": "cus_gone", "deleted": true })).unwrap();
        assert!(customer.deleted);
        assert!(customer.account_id().is_none());
    }

    #[test]
    fn subscription_maps_first_item() {
        let subscription: Subscription = serde_json::from_value(json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "trialing",
            "created": 1_700_000_000,
            "trial_end": 1_701_209_600,
            "items": {
                "object": "list",
                "data": [{
                    "id": "si_1",
                    "quantity": 1,
                    "current_period_start": 1_700_000_000,
                    "current_period_end": 1_702_592_000,
                    "price": { "id": "price_basic", "nickname": "Basic", "currency": "usd" }
                }]
            },
            "metadata": { "basejump_account_id": "acct_1" }
        }))
        .unwrap();

        let billing = subscription.to_billing().unwrap();
        assert_eq!(billing.customer_id.as_str(), "cus_1");
        assert_eq!(billing.status, SubscriptionStatus::Trialing);
        assert_eq!(billing.plan_id.unwrap().as_str(), "price_basic");
        assert_eq!(billing.plan_name.as_deref(), Some("Basic"));
        assert_eq!(billing.current_period_end, Some(1_702_592_000));
        assert_eq!(billing.trial_end, Some(1_701_209_600));
        assert_eq!(billing.account_id.unwrap().as_str(), "acct_1");
    }

    #[test]
    fn expanded_customer_on_subscription() {
        let subscription: Subscription = serde_json::from_value(json!({
            "id": "sub_2",
            "customer": { "id": "cus_2", "email": "x@y.z" },
            "status": "active"
        }))
        .unwrap();

        assert_eq!(subscription.customer.id(), "cus_2");
        assert!(subscription.customer.as_object().is_some());
        assert!(subscription.items.data.is_empty());
    }

    #[test]
    fn price_with_expanded_product_becomes_plan() {
        let price: Price = serde_json::from_value(json!({
            "id": "price_pro",
            "active": true,
            "currency": "usd",
            "unit_amount": 2000,
            "recurring": { "interval": "month", "interval_count": 1, "trial_period_days": 7 },
            "product": { "id": "prod_1", "name": "Pro", "description": "Everything" }
        }))
        .unwrap();

        let plan = price.to_plan().unwrap();
        assert_eq!(plan.name, "Pro");
        assert_eq!(plan.description.as_deref(), Some("Everything"));
        assert_eq!(plan.amount, Some(2000));
        assert_eq!(plan.interval.as_deref(), Some("month"));
        assert_eq!(plan.trial_period_days, Some(7));
    }

    #[test]
    fn price_name_falls_back_to_id() {
        let price: Price =
            serde_json::from_value(json!({ "id": "price_x", "product": "prod_x" })).unwrap();
        assert_eq!(price.display_name(), "price_x");
    }
}
