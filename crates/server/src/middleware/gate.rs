//! Access gate for the authenticated API surface.
//!
//! Every `/api` route (except the auth handshake and webhook receiver) runs
//! behind this gate. Admission requires both a shop-bound browser session
//! and durable membership in the installation set; a shop that passed the
//! handshake but lost its installation record is bounced back into auth
//! rather than served.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tower_sessions::Session;

use memodeck_core::ShopDomain;

use crate::db::{InstallationRepository, MerchantRepository, SessionRepository};
use crate::error::AppError;
use crate::models::{CurrentSession, session_keys};
use crate::state::AppState;

/// Middleware admitting only installed shops with a live session.
///
/// On admission the resolved [`CurrentSession`] is inserted into request
/// extensions for handlers to pull out via [`RequireSession`].
pub async fn require_install(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let shop: Option<ShopDomain> = session
        .get(session_keys::CURRENT_SHOP)
        .await
        .ok()
        .flatten();

    let Some(shop) = shop else {
        return Err(AppError::NoSession(
            "No shop in browser session".to_string(),
        ));
    };

    let offline = SessionRepository::new(state.pool()).get(&shop).await?;
    let Some(offline) = offline else {
        tracing::warn!(shop = %shop, "Browser session names a shop with no stored grant");
        return Err(AppError::NoSession("No access grant for shop".to_string()));
    };

    if !InstallationRepository::new(state.pool())
        .includes(&shop)
        .await?
    {
        // Not (or no longer) installed: restart the handshake instead of
        // serving with a token the platform may have revoked.
        tracing::info!(shop = %shop, "Shop not in installation set, redirecting to auth");
        let target = format!("/api/auth?shop={}", urlencoding::encode(shop.as_str()));
        return Ok(crate::routes::found(&target));
    }

    // First gated request after install creates the merchant record.
    MerchantRepository::new(state.pool())
        .get_or_create(&shop, &offline.access_token)
        .await?;

    request
        .extensions_mut()
        .insert(CurrentSession::from(&offline));

    Ok(next.run(request).await)
}

/// Extractor for the session resolved by [`require_install`].
pub struct RequireSession(pub CurrentSession);

impl<S> FromRequestParts<S> for RequireSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .map(Self)
            .ok_or_else(|| {
                AppError::Internal("RequireSession used outside the access gate".to_string())
            })
    }
}
