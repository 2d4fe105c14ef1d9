//! Core types for edge-billing.
//!
//! This crate provides the provider-independent pieces of the billing functions:
//!
//! - **Identifiers**: `AccountId`, `CustomerId`, `SubscriptionId`, `PlanId`
//! - **Billing shapes**: `BillingCustomer`, `BillingSubscription`, `Plan`,
//!   `BillingStatus`, `SessionUrl`
//! - **Capability**: the `BillingProvider` trait and its argument types
//! - **Time**: `Clock` and the trial-end calculation
//!
//! # Account tagging
//!
//! Every customer, subscription and checkout session created upstream carries
//! the internal account id under [`ACCOUNT_ID_METADATA_KEY`]. Later lookups
//! search on that key, so it must never change for existing data.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod billing;
pub mod clock;
pub mod error;
pub mod ids;
pub mod provider;

pub use billing::{
    BillingCustomer, BillingStatus, BillingSubscription, Plan, ProviderKind, SessionUrl,
    SubscriptionStatus, ACCOUNT_ID_METADATA_KEY,
};
pub use clock::{trial_end, Clock, FixedClock, SystemClock, SECONDS_PER_DAY};
pub use error::{BillingError, Result};
pub use ids::{AccountId, CustomerId, IdError, PlanId, SubscriptionId, MAX_ID_LEN};
pub use provider::{BillingPortalArgs, BillingProvider, BillingStatusArgs, NewSubscriptionArgs};
