//! API handlers.

pub mod functions;
pub mod health;
pub mod webhooks;
