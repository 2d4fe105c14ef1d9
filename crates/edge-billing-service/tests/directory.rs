//! PostgREST account directory tests.

mod common;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{fake_customer, fake_subscription};
use edge_billing_core::AccountId;
use edge_billing_service::{AccountDirectory, AccountRole, DirectoryError, PostgrestDirectory};

fn directory(server: &MockServer) -> PostgrestDirectory {
    PostgrestDirectory::new(server.uri(), "anon-key", "service-key").unwrap()
}

fn account() -> AccountId {
    "acct_1".parse().unwrap()
}

#[tokio::test]
async fn billing_info_runs_with_the_callers_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/get_account_billing_status"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer user-token"))
        .and(body_partial_json(json!({ "account_id": "acct_1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "account_id": "acct_1",
            "account_role": "owner",
            "is_primary_owner": true,
            "is_personal_account": false,
            "billing_enabled": true,
            "billing_status": "active",
            "billing_customer_id": "cus_1",
            "billing_subscription_id": "sub_1",
            "billing_email": "a@b.com",
            "billing_provider": "stripe"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let info = directory(&server)
        .billing_info("user-token", &account())
        .await
        .unwrap();

    assert_eq!(info.account_role, AccountRole::Owner);
    assert_eq!(info.billing_customer_id.unwrap().as_str(), "cus_1");
    assert_eq!(info.billing_subscription_id.unwrap().as_str(), "sub_1");
    assert_eq!(info.billing_email.as_deref(), Some("a@b.com"));
}

#[tokio::test]
async fn refused_reads_are_denied() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/get_account_billing_status"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": "42501",
            "message": "Not found, or not a member of account"
        })))
        .mount(&server)
        .await;

    let err = directory(&server)
        .billing_info("user-token", &account())
        .await
        .unwrap_err();

    match err {
        DirectoryError::Denied { status, message } => {
            assert_eq!(status, 403);
            assert!(message.contains("not a member"));
        }
        other => panic!("expected Denied, got {other:?}"),
    }
}

#[tokio::test]
async fn server_failures_are_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/get_account_billing_status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = directory(&server)
        .billing_info("user-token", &account())
        .await
        .unwrap_err();

    assert!(matches!(err, DirectoryError::Api { status: 500, .. }));
}

#[tokio::test]
async fn upsert_uses_the_service_role() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/service_role_upsert_customer_subscription"))
        .and(header("apikey", "service-key"))
        .and(header("authorization", "Bearer service-key"))
        .and(body_partial_json(json!({
            "account_id": "acct_1",
            "customer": {
                "id": "cus_fake",
                "billing_email": "billing@example.com",
                "provider": "stripe"
            },
            "subscription": {
                "id": "sub_fake",
                "status": "trialing",
                "price_id": "price_basic",
                "plan_name": "Basic",
                "provider": "stripe"
            }
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let account = account();
    directory(&server)
        .upsert_customer_subscription(
            &account,
            Some(&fake_customer(&account)),
            Some(&fake_subscription(&account)),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn upsert_sends_null_for_missing_parts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/service_role_upsert_customer_subscription"))
        .and(body_partial_json(json!({ "account_id": "acct_1", "customer": null })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let account = account();
    directory(&server)
        .upsert_customer_subscription(&account, None, Some(&fake_subscription(&account)))
        .await
        .unwrap();
}
