//! Subscription billing routes.
//!
//! Subscription state lives on the platform; these routes create and cancel
//! it and keep only the usage line-item id locally.

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::db::MerchantRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireSession;
use crate::shopify::kind_for_merchant;
use crate::state::AppState;

/// Query parameters for `GET /api/charge`.
#[derive(Debug, Deserialize)]
pub struct ChargeParams {
    /// Merchant-selected plan name; falls back to the configured one.
    plan: Option<String>,
}

/// Send the merchant to the subscription confirmation page.
///
/// The confirmation page cannot load inside the admin iframe. Requests
/// authenticated with a bearer token come from App Bridge, which expects a
/// 403 with reauthorize headers and performs the top-level redirect itself;
/// plain navigation gets an ordinary redirect.
fn top_level_redirect(headers: &HeaderMap, url: &str) -> Response {
    let embedded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));

    if embedded {
        (
            StatusCode::FORBIDDEN,
            [
                ("X-Shopify-API-Request-Failure-Reauthorize", "1"),
                ("X-Shopify-API-Request-Failure-Reauthorize-Url", url),
            ],
        )
            .into_response()
    } else {
        super::found(url)
    }
}

/// GET /api/charge - create a recurring subscription for the shop.
///
/// The plan variant follows the merchant's discount flag. On success the
/// usage line-item id is persisted (overwriting any previous one) and the
/// merchant is sent to the platform confirmation page via
/// [`top_level_redirect`].
#[instrument(skip(state, session, headers), fields(shop = %session.0.shop))]
pub async fn start_charge(
    State(state): State<AppState>,
    session: RequireSession,
    headers: HeaderMap,
    Query(params): Query<ChargeParams>,
) -> Result<Response> {
    let RequireSession(current) = session;
    let repo = MerchantRepository::new(state.pool());

    let merchant = repo
        .get(&current.shop)
        .await?
        .ok_or_else(|| AppError::NotFound("merchant".to_string()))?;

    let kind = kind_for_merchant(merchant.discount);
    let return_url = format!(
        "{}/?shop={}",
        state.config().base_url,
        urlencoding::encode(current.shop.as_str())
    );

    let charge = state
        .shopify()
        .create_subscription(
            &current.shop,
            &current.access_token,
            &state.config().billing,
            kind,
            params.plan.as_deref(),
            &return_url,
        )
        .await?;

    if let Some(usage_id) = &charge.usage_line_item_id {
        repo.set_usage_sub_id(&current.shop, usage_id).await?;
    } else {
        tracing::warn!(shop = %current.shop, "Subscription created without a usage line item");
    }

    tracing::info!(shop = %current.shop, kind = ?kind, "Subscription created, redirecting to confirmation");
    Ok(top_level_redirect(&headers, &charge.confirmation_url))
}

/// DELETE /api/charge - cancel the shop's active subscription.
///
/// With no active subscription this is a clean no-op. The stored usage
/// line-item id is kept; a later resubscribe overwrites it.
#[instrument(skip(state, session), fields(shop = %session.0.shop))]
pub async fn cancel_charge(
    State(state): State<AppState>,
    session: RequireSession,
) -> Result<Json<serde_json::Value>> {
    let RequireSession(current) = session;

    let Some(subscription) = state
        .shopify()
        .current_subscription(&current.shop, &current.access_token)
        .await?
    else {
        tracing::info!(shop = %current.shop, "Cancel requested with no active subscription");
        return Ok(Json(json!({ "cancelled": false })));
    };

    state
        .shopify()
        .cancel_subscription(&current.shop, &current.access_token, &subscription.id)
        .await?;

    tracing::info!(shop = %current.shop, subscription_id = %subscription.id, "Subscription cancelled");
    Ok(Json(json!({ "cancelled": true })))
}
