//! Gated merchant API routes.

use std::collections::HashMap;

use axum::{Json, extract::State};
use serde_json::json;
use tracing::instrument;

use crate::db::MerchantRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireSession;
use crate::models::Merchant;
use crate::state::AppState;

/// GET /api/user - current merchant record (access token omitted).
#[instrument(skip(state, session), fields(shop = %session.0.shop))]
pub async fn get_user(
    State(state): State<AppState>,
    session: RequireSession,
) -> Result<Json<Merchant>> {
    let RequireSession(current) = session;

    let merchant = MerchantRepository::new(state.pool())
        .get(&current.shop)
        .await?
        .ok_or_else(|| AppError::NotFound("merchant".to_string()))?;

    Ok(Json(merchant))
}

/// GET /api/memos - all product memos for the shop, keyed by product id.
#[instrument(skip(state, session), fields(shop = %session.0.shop))]
pub async fn get_memos(
    State(state): State<AppState>,
    session: RequireSession,
) -> Result<Json<HashMap<String, String>>> {
    let RequireSession(current) = session;

    let memos = MerchantRepository::new(state.pool())
        .memos(&current.shop)
        .await?;

    Ok(Json(memos))
}

/// PUT /api/memos/update - upsert a batch of product memos.
#[instrument(skip(state, session, memos), fields(shop = %session.0.shop))]
pub async fn update_memos(
    State(state): State<AppState>,
    session: RequireSession,
    Json(memos): Json<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>> {
    let RequireSession(current) = session;

    MerchantRepository::new(state.pool())
        .upsert_memos(&current.shop, &memos)
        .await?;

    tracing::info!(shop = %current.shop, count = memos.len(), "Memos updated");
    Ok(Json(json!({ "success": true })))
}
