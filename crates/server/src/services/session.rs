//! Install handshake verification and finalization.
//!
//! The OAuth callback is only trusted after two independent checks: the
//! query-string HMAC proves the redirect came from Shopify, and the state
//! nonce proves it answers a handshake this server started. Finalization
//! then makes the install visible in a fixed order so a shop is never
//! gated in without registered webhooks.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::instrument;

use memodeck_core::ShopDomain;

use crate::db::{InstallationRepository, RepositoryError, SessionRepository};
use crate::models::OfflineSession;
use crate::shopify::{AccessToken, RegisterWebhooks, ShopifyError};

type HmacSha256 = Hmac<Sha256>;

/// Errors finalizing an install.
#[derive(Debug, Error)]
pub enum InstallError {
    /// Persisting session or installation state failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Mandatory webhook registration failed; the install was rolled back.
    #[error("Webhook registration failed: {0}")]
    Registration(#[source] ShopifyError),
}

/// Verify the HMAC signature on OAuth callback query parameters.
///
/// The message is every parameter except `hmac` (and legacy `signature`),
/// sorted by key and joined as `k=v&k=v`; the signature is hex-encoded
/// HMAC-SHA256 keyed by the app API secret. Comparison is constant-time.
#[must_use]
pub fn verify_callback_hmac(api_secret: &str, params: &HashMap<String, String>) -> bool {
    let Some(provided) = params.get("hmac") else {
        return false;
    };

    let Ok(expected) = hex::decode(provided) else {
        return false;
    };

    let mut pairs: Vec<(&str, &str)> = params
        .iter()
        .filter(|(k, _)| k.as_str() != "hmac" && k.as_str() != "signature")
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    pairs.sort_unstable();

    let message: String = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let Ok(mut mac) = HmacSha256::new_from_slice(api_secret.as_bytes()) else {
        return false;
    };
    mac.update(message.as_bytes());

    mac.verify_slice(&expected).is_ok()
}

/// Make a completed token exchange durable and visible.
///
/// Order matters: the offline session is stored first, then the shop joins
/// the installation set, then mandatory webhooks are registered. If
/// registration fails the shop is removed from the installation set again,
/// so the access gate keeps bouncing it back into the handshake; the stored
/// session is kept so the retry can succeed.
#[instrument(skip(pool, registrar, token), fields(shop = %shop))]
pub async fn finalize_install(
    pool: &SqlitePool,
    registrar: &impl RegisterWebhooks,
    shop: &ShopDomain,
    token: &AccessToken,
) -> Result<(), InstallError> {
    SessionRepository::new(pool)
        .save(&OfflineSession {
            shop: shop.clone(),
            access_token: token.access_token.clone(),
            scope: token.scope.clone(),
            is_online: false,
            obtained_at: token.obtained_at,
        })
        .await?;

    InstallationRepository::new(pool).add(shop).await?;

    if let Err(err) = registrar.register_webhooks(shop, &token.access_token).await {
        if let Err(db_err) = InstallationRepository::new(pool).delete(shop).await {
            tracing::error!(error = %db_err, "Failed to roll back installation record");
        }
        return Err(InstallError::Registration(err));
    }

    tracing::info!("Install finalized");
    Ok(())
}
