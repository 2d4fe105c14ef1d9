//! Stripe integration for the billing functions.
//!
//! Stripe handles:
//! - Customer lookup and registration, tagged by account
//! - Subscription lookup and creation with trial defaults
//! - Subscription checkout and the billing portal
//! - Signed webhooks for subscription and customer changes

pub mod client;
pub mod customer;
pub mod handler;
pub mod subscription;
pub mod types;
pub mod webhook;

pub use client::{StripeClient, StripeError};
pub use customer::{find_or_create_customer, Resolved};
pub use handler::{HandlerDefaults, StripeFunctionHandler};
pub use subscription::{find_or_create_subscription, SubscriptionLookup};
pub use webhook::{BillingEvent, DEFAULT_TOLERANCE_SECONDS};
