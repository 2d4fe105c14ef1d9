//! Common test utilities for edge-billing integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::HeaderValue;
use axum_test::TestServer;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use wiremock::MockServer;

use edge_billing_core::{
    AccountId, BillingCustomer, BillingError, BillingPortalArgs, BillingProvider, BillingStatus,
    BillingStatusArgs, BillingSubscription, Clock, FixedClock, NewSubscriptionArgs, Plan,
    ProviderKind, SessionUrl, SubscriptionStatus,
};
use edge_billing_service::auth::JwtClaims;
use edge_billing_service::{
    create_router, AccountBillingInfo, AccountDirectory, AccountRole, AppState, DirectoryError,
    ServiceConfig, StripeClient,
};

/// Secret used to sign test user tokens.
pub const JWT_SECRET: &str = "test-jwt-secret";

/// Secret used to sign test webhooks.
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Subject of test user tokens.
pub const USER_ID: &str = "8d5f6a3e-1c2b-4d7e-9f80-1a2b3c4d5e6f";

/// Fixed "now" for trial and webhook timestamps.
pub const NOW: i64 = 1_700_000_000;

/// Mint a signed user token.
pub fn user_token() -> String {
    let claims = JwtClaims {
        sub: USER_ID.into(),
        aud: Some(Value::String("authenticated".into())),
        exp: chrono::Utc::now().timestamp() + 3600,
        iat: None,
        role: Some("authenticated".into()),
        email: Some("user@example.com".into()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token")
}

/// `Authorization` header value for the test user.
pub fn user_auth_header() -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", user_token())).expect("Invalid header value")
}

/// A Stripe client pointed at a mock server.
pub fn stripe_client(server: &MockServer, webhook_secret: Option<&str>) -> StripeClient {
    StripeClient::new("sk_test_mock", webhook_secret.map(str::to_string))
        .expect("Failed to create Stripe client")
        .with_base_url(server.uri())
}

/// A fixed clock at [`NOW`].
pub fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::at_unix(NOW))
}

// ============================================================================
// Stripe payload fixtures
// ============================================================================

/// A Stripe customer object.
pub fn customer_json(id: &str, account_id: Option<&str>, email: Option<&str>) -> Value {
    let metadata = match account_id {
        Some(account) => json!({ "basejump_account_id": account }),
        None => json!({}),
    };
    json!({
        "id": id,
        "object": "customer",
        "email": email,
        "metadata": metadata,
        "created": NOW - 100,
    })
}

/// A Stripe subscription object on one price.
pub fn subscription_json(id: &str, customer: &str, status: &str, account_id: &str) -> Value {
    json!({
        "id": id,
        "object": "subscription",
        "customer": customer,
        "status": status,
        "cancel_at_period_end": false,
        "created": NOW - 50,
        "current_period_start": NOW - 50,
        "current_period_end": NOW + 86_400 * 30,
        "metadata": { "basejump_account_id": account_id },
        "items": {
            "object": "list",
            "data": [{
                "id": "si_1",
                "quantity": 1,
                "price": price_json("price_basic", "Basic"),
            }],
            "has_more": false,
        },
    })
}

/// A recurring Stripe price with its product expanded.
pub fn price_json(id: &str, product_name: &str) -> Value {
    json!({
        "id": id,
        "object": "price",
        "active": true,
        "currency": "usd",
        "unit_amount": 1500,
        "recurring": { "interval": "month", "interval_count": 1 },
        "product": {
            "id": format!("prod_{id}"),
            "object": "product",
            "name": product_name,
            "active": true,
        },
    })
}

/// A Stripe list wrapper.
pub fn list_json(data: Vec<Value>) -> Value {
    json!({ "object": "list", "data": data, "has_more": false })
}

// ============================================================================
// In-memory account directory
// ============================================================================

/// One recorded upsert.
#[derive(Debug, Clone)]
pub struct RecordedUpsert {
    pub account_id: AccountId,
    pub customer: Option<BillingCustomer>,
    pub subscription: Option<BillingSubscription>,
}

/// Account directory backed by a map; unknown accounts are refused.
#[derive(Default)]
pub struct InMemoryDirectory {
    accounts: Mutex<HashMap<AccountId, AccountBillingInfo>>,
    upserts: Mutex<Vec<RecordedUpsert>>,
}

impl InMemoryDirectory {
    /// Register an account the test user can see.
    pub fn insert(&self, info: AccountBillingInfo) {
        self.accounts
            .lock()
            .unwrap()
            .insert(info.account_id.clone(), info);
    }

    /// Everything upserted so far.
    pub fn upserts(&self) -> Vec<RecordedUpsert> {
        self.upserts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountDirectory for InMemoryDirectory {
    async fn billing_info(
        &self,
        _user_token: &str,
        account_id: &AccountId,
    ) -> Result<AccountBillingInfo, DirectoryError> {
        self.accounts
            .lock()
            .unwrap()
            .get(account_id)
            .cloned()
            .ok_or(DirectoryError::Denied {
                status: 403,
                message: "Not found or not a member".into(),
            })
    }

    async fn upsert_customer_subscription(
        &self,
        account_id: &AccountId,
        customer: Option<&BillingCustomer>,
        subscription: Option<&BillingSubscription>,
    ) -> Result<(), DirectoryError> {
        self.upserts.lock().unwrap().push(RecordedUpsert {
            account_id: account_id.clone(),
            customer: customer.cloned(),
            subscription: subscription.cloned(),
        });
        Ok(())
    }
}

/// Billing info for an account with billing enabled.
pub fn account_info(account_id: &str, role: AccountRole) -> AccountBillingInfo {
    AccountBillingInfo {
        account_id: account_id.parse().unwrap(),
        account_role: role,
        is_primary_owner: role == AccountRole::Owner,
        is_personal_account: false,
        billing_enabled: true,
        billing_status: None,
        billing_customer_id: None,
        billing_subscription_id: None,
        billing_email: Some("billing@example.com".into()),
        billing_provider: Some("stripe".into()),
    }
}

// ============================================================================
// Recording billing provider
// ============================================================================

/// Provider returning canned answers and recording what it was asked.
#[derive(Default)]
pub struct FakeProvider {
    pub status_calls: Mutex<Vec<BillingStatusArgs>>,
    pub checkout_calls: Mutex<Vec<NewSubscriptionArgs>>,
    pub portal_calls: Mutex<Vec<BillingPortalArgs>>,
}

/// The customer the fake provider resolves.
pub fn fake_customer(account_id: &AccountId) -> BillingCustomer {
    BillingCustomer {
        id: "cus_fake".parse().unwrap(),
        email: Some("billing@example.com".into()),
        account_id: Some(account_id.clone()),
        provider: ProviderKind::Stripe,
    }
}

/// The subscription the fake provider resolves.
pub fn fake_subscription(account_id: &AccountId) -> BillingSubscription {
    BillingSubscription {
        id: "sub_fake".parse().unwrap(),
        customer_id: "cus_fake".parse().unwrap(),
        account_id: Some(account_id.clone()),
        status: SubscriptionStatus::Trialing,
        plan_id: Some("price_basic".parse().unwrap()),
        plan_name: Some("Basic".into()),
        quantity: Some(1),
        cancel_at_period_end: false,
        created: NOW,
        current_period_start: Some(NOW),
        current_period_end: Some(NOW + 86_400 * 14),
        trial_start: Some(NOW),
        trial_end: Some(NOW + 86_400 * 14),
        cancel_at: None,
        canceled_at: None,
        ended_at: None,
        metadata: HashMap::new(),
        provider: ProviderKind::Stripe,
    }
}

#[async_trait]
impl BillingProvider for FakeProvider {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Stripe
    }

    async fn get_plans(&self) -> Result<Vec<Plan>, BillingError> {
        Ok(vec![Plan {
            id: "price_basic".parse().unwrap(),
            name: "Basic".into(),
            description: None,
            amount: Some(1500),
            currency: "usd".into(),
            interval: Some("month".into()),
            interval_count: Some(1),
            trial_period_days: None,
            active: true,
            metadata: HashMap::new(),
        }])
    }

    async fn get_billing_status(
        &self,
        args: BillingStatusArgs,
    ) -> Result<BillingStatus, BillingError> {
        let status = BillingStatus {
            provider: ProviderKind::Stripe,
            customer: Some(fake_customer(&args.account_id)),
            subscription: Some(fake_subscription(&args.account_id)),
        };
        self.status_calls.lock().unwrap().push(args);
        Ok(status)
    }

    async fn get_new_subscription_url(
        &self,
        args: NewSubscriptionArgs,
    ) -> Result<SessionUrl, BillingError> {
        self.checkout_calls.lock().unwrap().push(args);
        Ok(SessionUrl {
            url: "https://checkout.stripe.com/c/pay/cs_fake".into(),
        })
    }

    async fn get_billing_portal_url(
        &self,
        args: BillingPortalArgs,
    ) -> Result<SessionUrl, BillingError> {
        self.portal_calls.lock().unwrap().push(args);
        Ok(SessionUrl {
            url: "https://billing.stripe.com/p/session/fake".into(),
        })
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Test configuration with auth enabled and no integrations.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        listen_addr: "127.0.0.1:0".into(),
        supabase_jwt_secret: Some(JWT_SECRET.into()),
        default_trial_days: Some(14),
        default_plan_id: Some("price_basic".parse().unwrap()),
        ..ServiceConfig::default()
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The account directory behind the server.
    pub directory: Arc<InMemoryDirectory>,
    /// The billing provider behind the server.
    pub provider: Arc<FakeProvider>,
}

impl TestHarness {
    /// Harness with a fake provider and an in-memory directory.
    pub fn new() -> Self {
        let directory = Arc::new(InMemoryDirectory::default());
        let provider = Arc::new(FakeProvider::default());

        let state = AppState {
            config: test_config(),
            provider: Some(Arc::clone(&provider) as Arc<dyn BillingProvider>),
            stripe: None,
            directory: Some(Arc::clone(&directory) as Arc<dyn AccountDirectory>),
            clock: fixed_clock(),
        };

        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        Self {
            server,
            directory,
            provider,
        }
    }

    /// Harness for webhooks, with a Stripe client pointed at `stripe`.
    pub fn with_stripe(stripe: &MockServer, webhook_secret: Option<&str>) -> Self {
        let directory = Arc::new(InMemoryDirectory::default());
        let provider = Arc::new(FakeProvider::default());

        let state = AppState {
            config: test_config(),
            provider: Some(Arc::clone(&provider) as Arc<dyn BillingProvider>),
            stripe: Some(Arc::new(stripe_client(stripe, webhook_secret))),
            directory: Some(Arc::clone(&directory) as Arc<dyn AccountDirectory>),
            clock: fixed_clock(),
        };

        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        Self {
            server,
            directory,
            provider,
        }
    }

    /// Harness with nothing configured but auth.
    pub fn unconfigured() -> Self {
        let state = AppState::new(test_config());
        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        Self {
            server,
            directory: Arc::new(InMemoryDirectory::default()),
            provider: Arc::new(FakeProvider::default()),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
