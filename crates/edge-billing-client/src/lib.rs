//! Edge Billing Client SDK.
//!
//! A typed client for the billing-functions endpoint, acting as one signed-in
//! user.
//!
//! # Example
//!
//! ```no_run
//! use edge_billing_client::{BillingFunctionsClient, NewSubscriptionRequest};
//!
//! # async fn example() -> Result<(), edge_billing_client::ClientError> {
//! let client = BillingFunctionsClient::new(
//!     "http://edge-billing.billing-system.svc:8080",
//!     "user-access-token",
//! )?;
//!
//! let account_id = "acct_1".parse().expect("valid account id");
//! let status = client.get_billing_status(&account_id).await?;
//!
//! if !status.subscription_active {
//!     let checkout = client
//!         .get_new_subscription_url(&NewSubscriptionRequest {
//!             account_id,
//!             success_url: "https://app.example.com/billing?ok".into(),
//!             cancel_url: "https://app.example.com/billing".into(),
//!             plan_id: None,
//!         })
//!         .await?;
//!     println!("Redirect to {}", checkout.url);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{BillingFunctionsClient, ClientOptions};
pub use error::ClientError;
pub use types::{
    AccountRole, BillingStatusResponse, NewSubscriptionRequest, Plan, PortalRequest, SessionUrl,
};
