//! The billing-functions endpoint.
//!
//! One route dispatching on `action`, each action gated by the guard its
//! effect needs: reading plans needs a signed-in user, reading an account's
//! billing needs access to the account, and starting checkout or opening the
//! portal needs the owner role.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use edge_billing_core::{
    AccountId, BillingPortalArgs, BillingProvider, BillingStatus, BillingStatusArgs,
    NewSubscriptionArgs, PlanId, SubscriptionId, SubscriptionStatus,
};

use crate::accounts::{AccountBillingInfo, AccountRole};
use crate::auth::{require_authorized_billing_user, require_billing_owner, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;

/// A billing-function call.
#[derive(Debug, Deserialize)]
pub struct FunctionRequest {
    /// Which function to run.
    pub action: String,
    /// Function arguments.
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Arguments naming only an account.
#[derive(Debug, Deserialize)]
pub struct AccountArgs {
    /// The account.
    pub account_id: AccountId,
}

/// Arguments for `get_new_subscription_url`.
#[derive(Debug, Deserialize)]
pub struct SubscriptionUrlArgs {
    /// The account.
    pub account_id: AccountId,
    /// Redirect target after a completed checkout.
    pub success_url: String,
    /// Redirect target after an abandoned checkout.
    pub cancel_url: String,
    /// Plan to subscribe to.
    #[serde(default)]
    pub plan_id: Option<PlanId>,
}

/// Arguments for `get_billing_portal_url`.
#[derive(Debug, Deserialize)]
pub struct PortalUrlArgs {
    /// The account.
    pub account_id: AccountId,
    /// Where the portal's back link points.
    pub return_url: String,
}

/// Response of `get_billing_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingStatusResponse {
    /// Current subscription id.
    pub subscription_id: Option<SubscriptionId>,
    /// Whether the subscription is active or trialing.
    pub subscription_active: bool,
    /// Subscription status.
    pub status: Option<SubscriptionStatus>,
    /// Email billed.
    pub billing_email: Option<String>,
    /// Name of the subscribed plan.
    pub plan_name: Option<String>,
    /// The caller's role on the account.
    pub account_role: AccountRole,
    /// Whether the caller is the primary owner.
    pub is_primary_owner: bool,
    /// Whether billing is enabled.
    pub billing_enabled: bool,
}

impl BillingStatusResponse {
    /// Response built from stored account info alone.
    fn from_stored(info: &AccountBillingInfo) -> Self {
        Self {
            subscription_id: info.billing_subscription_id.clone(),
            subscription_active: info.billing_status.is_some_and(SubscriptionStatus::is_current),
            status: info.billing_status,
            billing_email: info.billing_email.clone(),
            plan_name: None,
            account_role: info.account_role,
            is_primary_owner: info.is_primary_owner,
            billing_enabled: info.billing_enabled,
        }
    }

    /// Response built from a fresh provider status.
    fn from_status(info: &AccountBillingInfo, status: &BillingStatus) -> Self {
        let subscription = status.subscription.as_ref();
        let billing_email = status
            .customer
            .as_ref()
            .and_then(|c| c.email.clone())
            .or_else(|| info.billing_email.clone());

        Self {
            subscription_id: subscription.map(|s| s.id.clone()),
            subscription_active: subscription.is_some_and(|s| s.status.is_current()),
            status: subscription.map(|s| s.status),
            billing_email,
            plan_name: subscription.and_then(|s| s.plan_name.clone()),
            account_role: info.account_role,
            is_primary_owner: info.is_primary_owner,
            billing_enabled: info.billing_enabled,
        }
    }
}

/// Run a billing function.
pub async fn billing_functions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<FunctionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    tracing::info!(
        user_id = %user.user_id,
        action = %request.action,
        "Billing function called"
    );

    match request.action.as_str() {
        "get_plans" => {
            let plans = provider(&state)?.get_plans().await?;
            Ok(Json(plans).into_response())
        }
        "get_billing_status" => {
            let args: AccountArgs = parse_args(request.args)?;
            let status = get_billing_status(&state, &user, &args.account_id).await?;
            Ok(Json(status).into_response())
        }
        "get_new_subscription_url" => {
            let args: SubscriptionUrlArgs = parse_args(request.args)?;
            let info = require_authorized_billing_user(&state, &user, &args.account_id).await?;
            require_billing_owner(&info)?;

            let session = provider(&state)?
                .get_new_subscription_url(NewSubscriptionArgs {
                    success_url: args.success_url,
                    cancel_url: args.cancel_url,
                    account_id: args.account_id,
                    plan_id: args.plan_id,
                    billing_email: info.billing_email,
                    customer_id: info.billing_customer_id,
                })
                .await?;
            Ok(Json(session).into_response())
        }
        "get_billing_portal_url" => {
            let args: PortalUrlArgs = parse_args(request.args)?;
            let info = require_authorized_billing_user(&state, &user, &args.account_id).await?;
            require_billing_owner(&info)?;

            let customer_id = info.billing_customer_id.ok_or_else(|| {
                ApiError::Validation("Account has no billing customer yet".into())
            })?;

            let session = provider(&state)?
                .get_billing_portal_url(BillingPortalArgs {
                    return_url: args.return_url,
                    customer_id,
                })
                .await?;
            Ok(Json(session).into_response())
        }
        other => Err(ApiError::BadRequest(format!("Unknown action: {other}"))),
    }
}

/// Resolve and persist an account's billing, then summarize it.
async fn get_billing_status(
    state: &AppState,
    user: &AuthUser,
    account_id: &AccountId,
) -> Result<BillingStatusResponse, ApiError> {
    let info = require_authorized_billing_user(state, user, account_id).await?;

    if !info.billing_enabled {
        return Ok(BillingStatusResponse::from_stored(&info));
    }

    let status = provider(state)?
        .get_billing_status(BillingStatusArgs {
            account_id: account_id.clone(),
            customer_id: info.billing_customer_id.clone(),
            billing_email: info.billing_email.clone(),
            default_trial_days: state.config.default_trial_days,
            default_plan_id: state.config.default_plan_id.clone(),
            subscription_id: info.billing_subscription_id.clone(),
        })
        .await?;

    if status.customer.is_some() {
        let directory = state
            .directory
            .as_ref()
            .ok_or_else(|| ApiError::ServiceUnavailable("Account directory not configured".into()))?;

        directory
            .upsert_customer_subscription(
                account_id,
                status.customer.as_ref(),
                status.subscription.as_ref(),
            )
            .await?;
    }

    Ok(BillingStatusResponse::from_status(&info, &status))
}

fn provider(state: &AppState) -> Result<&dyn BillingProvider, ApiError> {
    state
        .provider
        .as_deref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Billing provider not configured".into()))
}

fn parse_args<T: DeserializeOwned>(args: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(args).map_err(|e| ApiError::BadRequest(format!("Invalid args: {e}")))
}
