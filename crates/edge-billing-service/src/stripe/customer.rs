//! Find-or-create for Stripe customers.

use edge_billing_core::{AccountId, BillingCustomer, BillingError, CustomerId};

use super::client::StripeClient;

/// A resolved record and whether this call created it.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    /// The record.
    pub value: T,
    /// `true` if the record did not exist before this call.
    pub created: bool,
}

impl<T> Resolved<T> {
    pub(crate) fn found(value: T) -> Self {
        Self {
            value,
            created: false,
        }
    }

    pub(crate) fn created(value: T) -> Self {
        Self {
            value,
            created: true,
        }
    }
}

/// Resolve the customer for an account.
///
/// 1. An explicit `customer_id` is retrieved as-is; an unknown or deleted id
///    is [`BillingError::NotFound`].
/// 2. Otherwise the first customer tagged with `account_id` is returned.
/// 3. Otherwise a customer is created with `billing_email`, tagged with the
///    account. Without a billing email nothing is created and the result is
///    `None`.
///
/// At most one create call is made.
pub async fn find_or_create_customer(
    client: &StripeClient,
    account_id: &AccountId,
    customer_id: Option<&CustomerId>,
    billing_email: Option<&str>,
) -> Result<Option<Resolved<BillingCustomer>>, BillingError> {
    if let Some(customer_id) = customer_id {
        let customer = client
            .get_customer(customer_id)
            .await?
            .ok_or_else(|| BillingError::not_found("customer", customer_id.as_str()))?;

        return Ok(Some(Resolved::found(customer.to_billing()?)));
    }

    let existing = client.search_customers_by_account(account_id).await?;
    if let Some(customer) = existing.data.into_iter().find(|c| !c.deleted) {
        tracing::debug!(
            account_id = %account_id,
            customer_id = %customer.id,
            "Found Stripe customer by account metadata"
        );
        return Ok(Some(Resolved::found(customer.to_billing()?)));
    }

    let Some(email) = billing_email.map(str::trim).filter(|e| !e.is_empty()) else {
        tracing::info!(
            account_id = %account_id,
            "No Stripe customer for account and no billing email to create one"
        );
        return Ok(None);
    };

    let customer = client.create_customer(account_id, Some(email)).await?;

    tracing::info!(
        account_id = %account_id,
        customer_id = %customer.id,
        "Stripe customer created"
    );

    Ok(Some(Resolved::created(customer.to_billing()?)))
}
