//! Mandatory privacy-compliance webhook handling.
//!
//! The app stores no customer data, so the three GDPR topics reduce to an
//! acknowledged audit log entry. They still must be parsed and answered 200
//! or Shopify flags the app as non-compliant.

use crate::webhooks::{WebhookContext, WebhookError};

/// Handle a `CUSTOMERS_DATA_REQUEST`, `CUSTOMERS_REDACT` or `SHOP_REDACT`
/// delivery.
///
/// # Errors
///
/// Returns `WebhookError::Payload` if the delivery body is not valid JSON.
pub fn handle(ctx: &WebhookContext) -> Result<(), WebhookError> {
    let payload: serde_json::Value = serde_json::from_slice(&ctx.body)?;

    tracing::info!(
        topic = %ctx.topic,
        shop = %ctx.shop,
        shop_id = payload.get("shop_id").and_then(serde_json::Value::as_i64),
        "Compliance webhook acknowledged, no customer data is stored"
    );

    Ok(())
}
