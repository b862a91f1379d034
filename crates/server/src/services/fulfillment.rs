//! Fulfillment webhook handling.
//!
//! `FULFILLMENTS_CREATE` deliveries are parsed and handed to the
//! order-processing side. Product memos are keyed by product, not order, so
//! the delivery carries no local mutation; it is validated and logged so a
//! malformed payload still triggers redelivery instead of silent loss.

use serde::Deserialize;

use crate::webhooks::{WebhookContext, WebhookError};

/// Fields of a fulfillment delivery this app cares about.
#[derive(Debug, Deserialize)]
struct FulfillmentPayload {
    id: i64,
    order_id: i64,
    #[serde(default)]
    status: Option<String>,
}

/// Handle a `FULFILLMENTS_CREATE` delivery.
///
/// # Errors
///
/// Returns `WebhookError::Payload` if the delivery body does not carry the
/// fulfillment and order ids.
pub fn handle(ctx: &WebhookContext) -> Result<(), WebhookError> {
    let payload: FulfillmentPayload = serde_json::from_slice(&ctx.body)?;

    tracing::info!(
        shop = %ctx.shop,
        fulfillment_id = payload.id,
        order_id = payload.order_id,
        status = payload.status.as_deref().unwrap_or("unknown"),
        "Fulfillment recorded"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Bytes;

    use memodeck_core::ShopDomain;

    use super::*;

    #[test]
    fn valid_payload_is_handled() {
        let ctx = WebhookContext {
            topic: "FULFILLMENTS_CREATE".to_string(),
            shop: ShopDomain::parse("demo.myshopify.com").expect("valid shop"),
            body: Bytes::from_static(br#"{"id":7,"order_id":1001,"status":"success"}"#),
        };

        assert!(handle(&ctx).is_ok());
    }

    #[test]
    fn payload_without_order_id_is_an_error() {
        let ctx = WebhookContext {
            topic: "FULFILLMENTS_CREATE".to_string(),
            shop: ShopDomain::parse("demo.myshopify.com").expect("valid shop"),
            body: Bytes::from_static(br#"{"id":7}"#),
        };

        assert!(handle(&ctx).is_err());
    }
}
