//! Stripe webhook handler.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use edge_billing_core::{AccountId, BillingError, BillingSubscription, CustomerId, SubscriptionId};

use crate::accounts::AccountDirectory;
use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::types::WebhookEvent;
use crate::stripe::webhook::{classify, BillingEvent};
use crate::stripe::{StripeClient, StripeError};

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was processed.
    pub received: bool,
}

/// Handle Stripe webhooks.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let stripe = state
        .stripe
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Stripe not configured".into()))?;

    let event = parse_event(&state, stripe, &headers, &body)?;

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        "Received Stripe webhook"
    );

    let billing_event = classify(&event).map_err(|e| {
        tracing::warn!(event_id = %event.id, error = %e, "Unreadable Stripe event object");
        ApiError::BadRequest(e.to_string())
    })?;

    match billing_event {
        BillingEvent::SubscriptionChanged {
            account_id: Some(account_id),
            subscription,
            plan_named,
        } => {
            let subscription = if plan_named {
                subscription
            } else {
                refresh_subscription(stripe, subscription).await?
            };
            directory(&state)?
                .upsert_customer_subscription(&account_id, None, Some(&subscription))
                .await?;
            tracing::info!(
                account_id = %account_id,
                subscription_id = %subscription.id,
                status = %subscription.status,
                "Subscription change recorded"
            );
        }
        BillingEvent::CheckoutCompleted {
            account_id: Some(account_id),
            customer_id,
            subscription_id,
        } => {
            handle_checkout_completed(
                stripe,
                directory(&state)?,
                &account_id,
                customer_id.as_ref(),
                subscription_id.as_ref(),
            )
            .await?;
        }
        BillingEvent::CustomerChanged { customer } => {
            if let Some(account_id) = customer.account_id.as_ref() {
                directory(&state)?
                    .upsert_customer_subscription(account_id, Some(&customer), None)
                    .await?;
                tracing::info!(
                    account_id = %account_id,
                    customer_id = %customer.id,
                    "Customer change recorded"
                );
            } else {
                tracing::debug!(customer_id = %customer.id, "Customer not tagged with an account");
            }
        }
        BillingEvent::SubscriptionChanged {
            account_id: None, ..
        }
        | BillingEvent::CheckoutCompleted {
            account_id: None, ..
        } => {
            tracing::debug!(event_type = %event.event_type, "Event not tagged with an account");
        }
        BillingEvent::Ignored => {
            tracing::debug!(event_type = %event.event_type, "Unhandled Stripe event");
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}

/// Verify the signature and parse the event.
fn parse_event(
    state: &AppState,
    stripe: &StripeClient,
    headers: &HeaderMap,
    body: &str,
) -> Result<WebhookEvent, ApiError> {
    if !stripe.has_webhook_secret() {
        tracing::error!("Stripe webhook_secret not configured - refusing unverifiable webhook");
        return Err(ApiError::ServiceUnavailable(
            "Stripe webhook verification not configured".into(),
        ));
    }

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

    stripe
        .construct_event(
            body,
            signature,
            state.config.webhook_tolerance_seconds,
            state.clock.now().timestamp(),
        )
        .map_err(|e| match e {
            StripeError::InvalidSignature | StripeError::StaleTimestamp => {
                tracing::warn!(error = %e, "Invalid Stripe webhook signature");
                ApiError::BadRequest("Invalid webhook signature".into())
            }
            StripeError::Serialization(e) => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        })
}

/// Record the customer and subscription a completed checkout produced.
async fn handle_checkout_completed(
    stripe: &StripeClient,
    directory: &dyn AccountDirectory,
    account_id: &AccountId,
    customer_id: Option<&CustomerId>,
    subscription_id: Option<&SubscriptionId>,
) -> Result<(), ApiError> {
    let subscription = match subscription_id {
        Some(id) => stripe
            .get_subscription(id)
            .await
            .map_err(BillingError::from)?
            .map(|s| s.to_billing())
            .transpose()?,
        None => None,
    };

    let customer = match customer_id {
        Some(id) => stripe
            .get_customer(id)
            .await
            .map_err(BillingError::from)?
            .map(|c| c.to_billing())
            .transpose()?,
        None => None,
    };

    directory
        .upsert_customer_subscription(account_id, customer.as_ref(), subscription.as_ref())
        .await?;

    tracing::info!(
        account_id = %account_id,
        customer_id = ?customer.as_ref().map(|c| c.id.as_str()),
        subscription_id = ?subscription.as_ref().map(|s| s.id.as_str()),
        "Checkout completion recorded"
    );

    Ok(())
}

/// Re-read a subscription from Stripe so its plan name is the product name.
async fn refresh_subscription(
    stripe: &StripeClient,
    embedded: BillingSubscription,
) -> Result<BillingSubscription, ApiError> {
    let fetched = stripe
        .get_subscription(&embedded.id)
        .await
        .map_err(BillingError::from)?;

    match fetched {
        Some(subscription) => Ok(subscription.to_billing()?),
        None => Ok(embedded),
    }
}

fn directory(state: &AppState) -> Result<&dyn AccountDirectory, ApiError> {
    state
        .directory
        .as_deref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Account directory not configured".into()))
}
