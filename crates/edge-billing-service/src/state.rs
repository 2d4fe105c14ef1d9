//! Application state.

use std::sync::Arc;

use edge_billing_core::{BillingProvider, Clock, SystemClock};

use crate::accounts::{AccountDirectory, PostgrestDirectory};
use crate::config::ServiceConfig;
use crate::stripe::{HandlerDefaults, StripeClient, StripeFunctionHandler};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: ServiceConfig,

    /// Billing functions (optional; absent without a Stripe key).
    pub provider: Option<Arc<dyn BillingProvider>>,

    /// Stripe client for webhook verification and lookups (optional).
    pub stripe: Option<Arc<StripeClient>>,

    /// Account directory (optional; absent without Supabase settings).
    pub directory: Option<Arc<dyn AccountDirectory>>,

    /// Time source for webhook tolerance checks.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create application state from configuration.
    ///
    /// Integrations that are not configured, or fail to initialize, are left
    /// out; the routes that need them answer 503.
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        let stripe = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::new(key, config.stripe_webhook_secret.clone()) {
                Ok(client) => {
                    let client = match &config.stripe_api_base {
                        Some(base) => client.with_base_url(base),
                        None => client,
                    };
                    tracing::info!(
                        webhooks = client.has_webhook_secret(),
                        "Stripe integration enabled"
                    );
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if stripe.is_none() {
            tracing::warn!("Stripe not configured - billing functions will not be available");
        }

        let provider = stripe.as_ref().map(|client| {
            let handler = StripeFunctionHandler::new(
                Arc::clone(client),
                HandlerDefaults {
                    default_trial_days: config.default_trial_days,
                    default_plan_id: config.default_plan_id.clone(),
                },
            );
            Arc::new(handler) as Arc<dyn BillingProvider>
        });

        let directory = match (
            &config.supabase_url,
            &config.supabase_anon_key,
            &config.supabase_service_role_key,
        ) {
            (Some(url), Some(anon), Some(service)) => {
                match PostgrestDirectory::new(url, anon, service) {
                    Ok(directory) => {
                        tracing::info!(supabase_url = %url, "Account directory enabled");
                        Some(Arc::new(directory) as Arc<dyn AccountDirectory>)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to create account directory");
                        None
                    }
                }
            }
            _ => None,
        };

        if directory.is_none() {
            tracing::warn!("Supabase not configured - account billing lookups will not be available");
        }

        Self {
            config,
            provider,
            stripe,
            directory,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Name of the configured billing provider, if any.
    #[must_use]
    pub fn provider_name(&self) -> Option<&'static str> {
        self.provider.as_ref().map(|p| p.provider().as_str())
    }
}
