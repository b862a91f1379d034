//! OAuth install handshake routes.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    response::Response,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use memodeck_core::ShopDomain;

use crate::error::{AppError, Result};
use crate::models::session_keys;
use crate::services::session::{finalize_install, verify_callback_hmac};
use crate::state::AppState;

/// Query parameters for `GET /api/auth`.
#[derive(Debug, Deserialize)]
pub struct BeginParams {
    shop: Option<String>,
    host: Option<String>,
}

/// GET /api/auth - begin the install handshake for a shop.
///
/// Validates the shop domain, stores a single-use state nonce in the
/// browser session and redirects to the platform authorization page.
#[instrument(skip(state, session))]
pub async fn begin(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<BeginParams>,
) -> Result<Response> {
    let raw_shop = params
        .shop
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("No shop provided".to_string()))?;
    let shop = ShopDomain::parse(raw_shop)?;

    let nonce = uuid::Uuid::new_v4().to_string();
    session
        .insert(session_keys::OAUTH_STATE, &nonce)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to store OAuth state: {e}")))?;

    let url = state.shopify().authorization_url(
        &shop,
        &state.config().auth_callback_url(),
        &state.config().shopify.scopes,
        &nonce,
    );

    tracing::info!(shop = %shop, host = ?params.host, "Starting install handshake");
    Ok(super::found(&url))
}

/// GET /api/auth/callback - complete the install handshake.
///
/// The redirect is only trusted after the query HMAC verifies and the state
/// nonce matches the one stored by [`begin`]. The nonce is consumed either
/// way, so a replayed callback fails.
#[instrument(skip(state, session, params))]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    if !verify_callback_hmac(state.shopify().api_secret(), &params) {
        tracing::warn!("Invalid HMAC on OAuth callback");
        return Err(AppError::BadRequest(
            "Invalid callback signature".to_string(),
        ));
    }

    let raw_shop = params
        .get("shop")
        .ok_or_else(|| AppError::BadRequest("No shop provided".to_string()))?;
    let shop = ShopDomain::parse(raw_shop)?;

    let stored_state: Option<String> = session
        .remove(session_keys::OAUTH_STATE)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read OAuth state: {e}")))?;
    if stored_state.as_deref() != params.get("state").map(String::as_str)
        || stored_state.is_none()
    {
        tracing::warn!(shop = %shop, "OAuth state mismatch");
        return Err(AppError::BadRequest("OAuth state mismatch".to_string()));
    }

    let code = params
        .get("code")
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let token = state.shopify().exchange_code(&shop, code).await?;

    finalize_install(state.pool(), state.shopify(), &shop, &token).await?;

    session
        .insert(session_keys::CURRENT_SHOP, &shop)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to store session shop: {e}")))?;

    let mut target = format!("/?shop={}", urlencoding::encode(shop.as_str()));
    if let Some(host) = params.get("host") {
        target.push_str(&format!("&host={}", urlencoding::encode(host)));
    }

    tracing::info!(shop = %shop, "Install handshake completed");
    Ok(super::found(&target))
}
