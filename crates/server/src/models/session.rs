//! Session models and browser-session keys.

use memodeck_core::ShopDomain;

/// Keys used to store values in the signed browser session.
pub mod session_keys {
    /// Single-use OAuth state nonce, set by `begin_auth` and consumed by the
    /// callback.
    pub const OAUTH_STATE: &str = "shopify_oauth_state";

    /// Shop the browser session is authenticated for, set after a completed
    /// handshake.
    pub const CURRENT_SHOP: &str = "current_shop";
}

/// A persistent (offline) grant for one shop.
///
/// At most one exists per shop; a repeated handshake overwrites it. This app
/// never requests online (user-scoped) tokens, so `is_online` is stored but
/// always false.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct OfflineSession {
    /// Shop the grant belongs to.
    pub shop: ShopDomain,
    /// Access token for Admin API calls (redacted in debug output).
    pub access_token: String,
    /// Granted scopes, comma-separated as returned by the token exchange.
    pub scope: String,
    /// Token lifetime class; always false (offline) for this app.
    pub is_online: bool,
    /// Unix timestamp when the token was obtained.
    pub obtained_at: i64,
}

impl std::fmt::Debug for OfflineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineSession")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("is_online", &self.is_online)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// The session resolved for an admitted request.
///
/// Inserted into request extensions by the access gate; handlers pull it out
/// with the [`crate::middleware::RequireSession`] extractor.
#[derive(Clone)]
pub struct CurrentSession {
    /// Shop the request is authenticated for.
    pub shop: ShopDomain,
    /// Access token for Admin API calls on behalf of this shop.
    pub access_token: String,
}

impl std::fmt::Debug for CurrentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentSession")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl From<&OfflineSession> for CurrentSession {
    fn from(session: &OfflineSession) -> Self {
        Self {
            shop: session.shop.clone(),
            access_token: session.access_token.clone(),
        }
    }
}
