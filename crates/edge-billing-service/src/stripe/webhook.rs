//! Stripe webhook verification and event classification.
//!
//! Stripe signs `"{timestamp}.{payload}"` with HMAC-SHA256 and sends the
//! result in the `Stripe-Signature` header as `t=<ts>,v1=<hex>[,v1=<hex>...]`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use edge_billing_core::{
    AccountId, BillingCustomer, BillingError, BillingSubscription, CustomerId, SubscriptionId,
};

use super::client::StripeError;
use super::types::{CheckoutSession, Customer, Subscription, WebhookEvent};

type HmacSha256 = Hmac<Sha256>;

/// Default maximum age of a signed webhook, in seconds.
pub const DEFAULT_TOLERANCE_SECONDS: i64 = 300;

/// Verify a `Stripe-Signature` header against the raw payload.
///
/// # Errors
///
/// - [`StripeError::InvalidSignature`] if the header is malformed or no `v1`
///   signature matches.
/// - [`StripeError::StaleTimestamp`] if the signed timestamp is further than
///   `tolerance_seconds` from `now`.
pub fn verify_signature(
    secret: &str,
    payload: &str,
    header: &str,
    tolerance_seconds: i64,
    now: i64,
) -> Result<(), StripeError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", ts)) => timestamp = Some(ts),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(StripeError::InvalidSignature)?;
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| StripeError::InvalidSignature)?;

    if signatures.is_empty() {
        return Err(StripeError::InvalidSignature);
    }

    let expected = sign(secret, &format!("{timestamp}.{payload}"));
    if !signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
        return Err(StripeError::InvalidSignature);
    }

    if (now - signed_at).abs() > tolerance_seconds {
        return Err(StripeError::StaleTimestamp);
    }

    Ok(())
}

/// Hex HMAC-SHA256 of `message` under `secret`.
///
/// # Panics
///
/// Never in practice: HMAC accepts keys of any length (RFC 2104).
#[must_use]
pub fn sign(secret: &str, message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Build a `Stripe-Signature` header value for `payload` signed at `timestamp`.
#[must_use]
pub fn signature_header(secret: &str, payload: &str, timestamp: i64) -> String {
    format!("t={timestamp},v1={}", sign(secret, &format!("{timestamp}.{payload}")))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// What a webhook event means for the account's billing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    /// A subscription was created, changed, paused, resumed or deleted.
    SubscriptionChanged {
        /// Account from the subscription metadata.
        account_id: Option<AccountId>,
        /// The subscription as embedded in the event.
        subscription: BillingSubscription,
        /// Whether `subscription.plan_name` came from an expanded product.
        plan_named: bool,
    },

    /// A subscription-mode checkout finished.
    CheckoutCompleted {
        /// Account from the session metadata.
        account_id: Option<AccountId>,
        /// Customer that paid.
        customer_id: Option<CustomerId>,
        /// Subscription the checkout created.
        subscription_id: Option<SubscriptionId>,
    },

    /// A customer was created or updated.
    CustomerChanged {
        /// The customer as embedded in the event.
        customer: BillingCustomer,
    },

    /// Nothing billing-relevant.
    Ignored,
}

/// Classify a verified event by type.
///
/// # Errors
///
/// Returns [`BillingError::UnexpectedResponse`] when a handled event type
/// carries an object that does not parse.
pub fn classify(event: &WebhookEvent) -> Result<BillingEvent, BillingError> {
    let object = &event.data.object;

    match event.event_type.as_str() {
        "customer.subscription.created"
        | "customer.subscription.updated"
        | "customer.subscription.deleted"
        | "customer.subscription.paused"
        | "customer.subscription.resumed"
        | "customer.subscription.trial_will_end" => {
            let subscription: Subscription = parse_object(&event.event_type, object)?;
            Ok(BillingEvent::SubscriptionChanged {
                account_id: subscription.account_id(),
                subscription: subscription.to_billing()?,
                plan_named: subscription.has_product_name(),
            })
        }
        "checkout.session.completed" => {
            let session: CheckoutSession = parse_object(&event.event_type, object)?;
            if session.mode.as_deref() != Some("subscription") {
                return Ok(BillingEvent::Ignored);
            }
            Ok(BillingEvent::CheckoutCompleted {
                account_id: session.account_id(),
                customer_id: session
                    .customer
                    .as_ref()
                    .and_then(|c| CustomerId::new(c.id()).ok()),
                subscription_id: session
                    .subscription
                    .as_ref()
                    .and_then(|s| SubscriptionId::new(s.id()).ok()),
            })
        }
        "customer.created" | "customer.updated" => {
            let customer: Customer = parse_object(&event.event_type, object)?;
            Ok(BillingEvent::CustomerChanged {
                customer: customer.to_billing()?,
            })
        }
        _ => Ok(BillingEvent::Ignored),
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(
    event_type: &str,
    object: &serde_json::Value,
) -> Result<T, BillingError> {
    T::deserialize(object).map_err(|e| {
        BillingError::UnexpectedResponse(format!("{event_type} payload: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_billing_core::SubscriptionStatus;
    use serde_json::json;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;

    fn event(event_type: &str, object: serde_json::Value) -> WebhookEvent {
        serde_json::from_value(json!({
            "id": "evt_1",
            "type": event_type,
            "created": NOW,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn valid_signature_passes() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = signature_header(SECRET, payload, NOW);
        assert!(verify_signature(SECRET, payload, &header, 300, NOW).is_ok());
    }

    #[test]
    fn any_matching_v1_signature_passes() {
        let payload = r#"{"id":"evt_1"}"#;
        let good = sign(SECRET, &format!("{NOW}.{payload}"));
        let header = format!("t={NOW},v1=deadbeef,v1={good}");
        assert!(verify_signature(SECRET, payload, &header, 300, NOW).is_ok());
    }

    #[test]
    fn tampered_payload_fails() {
        let header = signature_header(SECRET, r#"{"id":"evt_1"}"#, NOW);
        let err = verify_signature(SECRET, r#"{"id":"evt_2"}"#, &header, 300, NOW).unwrap_err();
        assert!(matches!(err, StripeError::InvalidSignature));
    }

    #[test]
    fn wrong_secret_fails() {
        let payload = "{}";
        let header = signature_header("whsec_other", payload, NOW);
        assert!(verify_signature(SECRET, payload, &header, 300, NOW).is_err());
    }

    #[test]
    fn stale_timestamp_fails() {
        let payload = "{}";
        let header = signature_header(SECRET, payload, NOW - 301);
        let err = verify_signature(SECRET, payload, &header, 300, NOW).unwrap_err();
        assert!(matches!(err, StripeError::StaleTimestamp));
    }

    #[test]
    fn malformed_headers_fail() {
        for header in ["", "v1=abc", "t=abc,v1=abc", "t=1700000000"] {
            assert!(
                verify_signature(SECRET, "{}", header, 300, NOW).is_err(),
                "header {header:?} should be rejected"
            );
        }
    }

    #[test]
    fn hmac_is_hex_sha256() {
        let digest = sign("key", "The quick brown fox jumps over the lazy dog");
        assert_eq!(
            digest,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn subscription_events_carry_account() {
        let classified = classify(&event(
            "customer.subscription.updated",
            json!({
                "id": "sub_1",
                "customer": "cus_1",
                "status": "past_due",
                "metadata": { "basejump_account_id": "acct_1" }
            }),
        ))
        .unwrap();

        match classified {
            BillingEvent::SubscriptionChanged {
                account_id,
                subscription,
                plan_named,
            } => {
                assert_eq!(account_id.unwrap().as_str(), "acct_1");
                assert_eq!(subscription.status, SubscriptionStatus::PastDue);
                assert!(plan_named);
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn unexpanded_products_are_flagged() {
        let classified = classify(&event(
            "customer.subscription.created",
            json!({
                "id": "sub_1",
                "customer": "cus_1",
                "status": "active",
                "items": {
                    "object": "list",
                    "data": [{ "id": "si_1", "price": { "id": "price_1", "product": "prod_1" } }]
                }
            }),
        ))
        .unwrap();

        assert!(matches!(
            classified,
            BillingEvent::SubscriptionChanged { plan_named: false, .. }
        ));
    }

    #[test]
    fn subscription_checkout_is_classified() {
        let classified = classify(&event(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "mode": "subscription",
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": { "basejump_account_id": "acct_1" }
            }),
        ))
        .unwrap();

        assert_eq!(
            classified,
            BillingEvent::CheckoutCompleted {
                account_id: Some("acct_1".parse().unwrap()),
                customer_id: Some("cus_1".parse().unwrap()),
                subscription_id: Some("sub_1".parse().unwrap()),
            }
        );
    }

    #[test]
    fn payment_mode_checkout_is_ignored() {
        let classified = classify(&event(
            "checkout.session.completed",
            json!({ "id": "cs_2", "mode": "payment" }),
        ))
        .unwrap();
        assert_eq!(classified, BillingEvent::Ignored);
    }

    #[test]
    fn unrelated_events_are_ignored() {
        let classified = classify(&event("invoice.paid", json!({ "id": "in_1" }))).unwrap();
        assert_eq!(classified, BillingEvent::Ignored);
    }

    #[test]
    fn malformed_subscription_is_an_error() {
        let err = classify(&event(
            "customer.subscription.created",
            json!({ "id": "sub_1" }),
        ))
        .unwrap_err();
        assert!(matches!(err, BillingError::UnexpectedResponse(_)));
    }
}
