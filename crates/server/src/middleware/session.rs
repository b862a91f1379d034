//! Session middleware configuration.
//!
//! Sets up sqlite-backed browser sessions using tower-sessions. Cookies are
//! signed with a key derived from the app API secret, so a forged cookie
//! cannot name an arbitrary shop.

use secrecy::ExposeSecret;
use sqlx::SqlitePool;
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

use crate::config::AppConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "memodeck_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer with a sqlite store.
///
/// The app runs inside an iframe on the platform admin, so the cookie must
/// be `SameSite=None` (third-party) when served over HTTPS; plain-HTTP dev
/// setups fall back to `Lax` since browsers reject `None` without `Secure`.
///
/// # Errors
///
/// Returns an error if the session table migration fails.
pub async fn create_session_layer(
    pool: &SqlitePool,
    config: &AppConfig,
) -> Result<SessionManagerLayer<SqliteStore, SignedCookie>, sqlx::Error> {
    let store = SqliteStore::new(pool.clone());
    store.migrate().await?;

    let is_secure = config.base_url.starts_with("https://");
    let same_site = if is_secure {
        tower_sessions::cookie::SameSite::None
    } else {
        tower_sessions::cookie::SameSite::Lax
    };

    let key = Key::derive_from(config.shopify.api_secret.expose_secret().as_bytes());

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(same_site)
        .with_http_only(true)
        .with_path("/")
        .with_signed(key))
}
