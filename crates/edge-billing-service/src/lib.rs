//! Edge billing HTTP service.
//!
//! This crate serves the billing functions for a multi-tenant application:
//!
//! - Plans, billing status, checkout and portal URLs behind one endpoint
//! - Stripe customer and subscription find-or-create
//! - Signed Stripe webhooks mirrored into the account directory
//!
//! # Authentication
//!
//! End users authenticate with Supabase-issued HS256 JWTs. Access to a
//! particular account is decided by the account directory, which evaluates the
//! caller's own token; billing changes additionally require the owner role.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for consistency

pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod stripe;

pub use accounts::{
    AccountBillingInfo, AccountDirectory, AccountRole, DirectoryError, PostgrestDirectory,
};
pub use auth::AuthUser;
pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError, StripeFunctionHandler};
