//! HTTP route handlers for the embedded app.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (public)
//! GET  /api/auth               - Begin OAuth install handshake
//! GET  /api/auth/callback      - Handle OAuth callback
//!
//! # Webhooks (public, HMAC-authenticated)
//! POST /api/webhooks           - Receive all webhook deliveries
//!
//! # Gated API (requires session + installation)
//! GET    /api/charge           - Create subscription, redirect to confirmation
//! DELETE /api/charge           - Cancel the active subscription
//! GET    /api/user             - Current merchant record
//! GET    /api/memos            - All product memos for the shop
//! PUT    /api/memos/update     - Upsert product memos
//!
//! # Shell
//! GET  /{*path}                - Embedded app shell (or bounce into auth)
//! ```

pub mod api;
pub mod auth;
pub mod billing;
pub mod shell;
pub mod webhooks;

use axum::{
    Router,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};

use crate::middleware::require_install;
use crate::state::AppState;

/// 302 redirect.
///
/// `axum::response::Redirect` only emits 303/307/308; the OAuth and
/// confirmation flows use the plain 302 the platform documents.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Create the application router.
///
/// The caller attaches the session layer (and Sentry layers) outside, so
/// tests can wire the same router against an in-memory database.
pub fn router(state: &AppState) -> Router<AppState> {
    let gated = Router::new()
        .route(
            "/api/charge",
            get(billing::start_charge).delete(billing::cancel_charge),
        )
        .route("/api/user", get(api::get_user))
        .route("/api/memos", get(api::get_memos))
        .route("/api/memos/update", put(api::update_memos))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_install,
        ));

    Router::new()
        .route("/api/auth", get(auth::begin))
        .route("/api/auth/callback", get(auth::callback))
        .route("/api/webhooks", post(webhooks::receive))
        .merge(gated)
        .fallback(get(shell::serve))
}
