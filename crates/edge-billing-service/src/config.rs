//! Service configuration.

use serde::Deserialize;
use std::path::Path;

use edge_billing_core::PlanId;

use crate::stripe::DEFAULT_TOLERANCE_SECONDS;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Stripe secret API key (optional; billing is unavailable without it).
    pub stripe_api_key: Option<String>,

    /// Stripe webhook signing secret. Webhooks are refused with 503 without it.
    pub stripe_webhook_secret: Option<String>,

    /// Override for the Stripe API root.
    pub stripe_api_base: Option<String>,

    /// Supabase project URL (optional; account lookups are unavailable without it).
    pub supabase_url: Option<String>,

    /// Supabase anon key, sent with user-scoped RPCs.
    pub supabase_anon_key: Option<String>,

    /// Supabase service-role key, used for billing record writes.
    pub supabase_service_role_key: Option<String>,

    /// Secret for HS256 user tokens.
    pub supabase_jwt_secret: Option<String>,

    /// Expected JWT audience (default: "authenticated").
    pub jwt_audience: String,

    /// Trial length for new subscriptions.
    pub default_trial_days: Option<u32>,

    /// Plan for new subscriptions.
    pub default_plan_id: Option<PlanId>,

    /// Maximum webhook timestamp age in seconds.
    pub webhook_tolerance_seconds: i64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

/// Supabase secrets file structure.
#[derive(Debug, Deserialize)]
struct SupabaseSecrets {
    url: String,
    anon_key: String,
    service_role_key: String,
    #[serde(default)]
    jwt_secret: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::from_vars(|key| std::env::var(key).ok());

        if let Some(secrets) = find_secrets::<StripeSecrets>("stripe.json") {
            config.stripe_api_key = Some(secrets.api_key);
            config.stripe_webhook_secret = secrets.webhook_secret.or(config.stripe_webhook_secret);
        }

        if let Some(secrets) = find_secrets::<SupabaseSecrets>("supabase.json") {
            config.supabase_url = Some(secrets.url);
            config.supabase_anon_key = Some(secrets.anon_key);
            config.supabase_service_role_key = Some(secrets.service_role_key);
            config.supabase_jwt_secret = secrets.jwt_secret.or(config.supabase_jwt_secret);
        }

        config
    }

    /// Build configuration from a variable lookup, applying defaults.
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            listen_addr: var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            stripe_api_key: var("STRIPE_API_KEY"),
            stripe_webhook_secret: var("STRIPE_WEBHOOK_SECRET"),
            stripe_api_base: var("STRIPE_API_BASE"),
            supabase_url: var("SUPABASE_URL"),
            supabase_anon_key: var("SUPABASE_ANON_KEY"),
            supabase_service_role_key: var("SUPABASE_SERVICE_ROLE_KEY"),
            supabase_jwt_secret: var("SUPABASE_JWT_SECRET"),
            jwt_audience: var("JWT_AUDIENCE").unwrap_or(defaults.jwt_audience),
            default_trial_days: var("DEFAULT_TRIAL_DAYS").and_then(|s| s.parse().ok()),
            default_plan_id: var("DEFAULT_PLAN_ID").and_then(|s| PlanId::new(s).ok()),
            webhook_tolerance_seconds: var("WEBHOOK_TOLERANCE_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.webhook_tolerance_seconds),
            cors_origins: var("CORS_ORIGINS").map_or(defaults.cors_origins, |s| {
                s.split(',').map(|s| s.trim().to_string()).collect()
            }),
            max_body_bytes: var("MAX_BODY_BYTES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: var("REQUEST_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.request_timeout_seconds),
        }
    }
}

/// Look for a secrets file in the usual relative locations.
fn find_secrets<T: serde::de::DeserializeOwned>(file_name: &str) -> Option<T> {
    let dirs = [
        ".secrets",
        "edge-billing/.secrets",
        "crates/edge-billing-service/.secrets",
        "../.secrets",
    ];

    for dir in &dirs {
        let path = Path::new(dir).join(file_name);
        match load_secrets_file::<T>(&path) {
            Ok(secrets) => {
                tracing::info!(path = %path.display(), "Loaded secrets from file");
                return Some(secrets);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable secrets file");
            }
        }
    }

    tracing::debug!(file = %file_name, "Secrets file not found, using environment variables");
    None
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, std::io::Error> {
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            stripe_api_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: None,
            supabase_url: None,
            supabase_anon_key: None,
            supabase_service_role_key: None,
            supabase_jwt_secret: None,
            jwt_audience: "authenticated".into(),
            default_trial_days: None,
            default_plan_id: None,
            webhook_tolerance_seconds: DEFAULT_TOLERANCE_SECONDS,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
