//! Webhook receiver endpoint.
//!
//! The body is taken as raw bytes, never as parsed JSON: the signature is
//! computed over the exact bytes Shopify sent.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::instrument;

use crate::state::AppState;

/// POST /api/webhooks - receive a webhook delivery.
#[instrument(skip_all)]
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    state.webhooks().dispatch(&headers, body).await
}
