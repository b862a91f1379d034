//! Webhook authentication and dispatch.
//!
//! One registry serves the single `/api/webhooks` endpoint. Every delivery
//! is authenticated against the raw body before anything else happens;
//! handlers are looked up by normalized topic. An unknown topic still
//! acknowledges with 200 so Shopify stops redelivering it.

pub mod verify;

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use sqlx::SqlitePool;
use thiserror::Error;

use memodeck_core::ShopDomain;

use crate::db::{
    InstallationRepository, MerchantRepository, RepositoryError, SessionRepository,
};
use crate::services::{compliance, fulfillment};

pub use verify::verify_webhook_signature;

/// Signature header set by Shopify on every delivery.
const HMAC_HEADER: &str = "x-shopify-hmac-sha256";
const TOPIC_HEADER: &str = "x-shopify-topic";
const SHOP_HEADER: &str = "x-shopify-shop-domain";

/// Errors surfaced by webhook handlers.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Database operation failed during handling.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Delivery payload could not be parsed.
    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// An authenticated delivery handed to a topic handler.
#[derive(Debug, Clone)]
pub struct WebhookContext {
    /// Normalized topic key (e.g. `APP_UNINSTALLED`).
    pub topic: String,
    /// Shop the delivery concerns.
    pub shop: ShopDomain,
    /// Raw request body.
    pub body: Bytes,
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), WebhookError>> + Send>>;
type Handler = Arc<dyn Fn(WebhookContext) -> HandlerFuture + Send + Sync>;

/// Topic-keyed webhook dispatcher.
///
/// Holds the app API secret for signature checks and a handler per topic.
/// Built once at startup and shared through application state.
#[derive(Clone)]
pub struct WebhookRegistry {
    api_secret: Arc<str>,
    handlers: Arc<HashMap<String, Handler>>,
}

/// Normalize a topic to the key handlers are registered under.
///
/// Shopify sends REST-style topics (`app/uninstalled`) in the header while
/// the GraphQL API names them `APP_UNINSTALLED`; both map to the same key.
fn topic_key(topic: &str) -> String {
    topic.trim().replace('/', "_").to_ascii_uppercase()
}

/// Builder-side registry, turned into a [`WebhookRegistry`] once all topics
/// are registered.
pub struct WebhookRegistryBuilder {
    api_secret: String,
    handlers: HashMap<String, Handler>,
}

impl WebhookRegistryBuilder {
    /// Start an empty registry keyed by the app API secret.
    #[must_use]
    pub fn new(api_secret: impl Into<String>) -> Self {
        Self {
            api_secret: api_secret.into(),
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a topic. A later registration for the same
    /// topic replaces the earlier one.
    pub fn add_handler<F>(&mut self, topic: &str, handler: F)
    where
        F: Fn(WebhookContext) -> HandlerFuture + Send + Sync + 'static,
    {
        self.handlers.insert(topic_key(topic), Arc::new(handler));
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> WebhookRegistry {
        WebhookRegistry {
            api_secret: self.api_secret.into(),
            handlers: Arc::new(self.handlers),
        }
    }
}

impl WebhookRegistry {
    /// Authenticate and dispatch one delivery, returning the status to send
    /// back to Shopify.
    ///
    /// Order is strict: the signature is checked against the raw body before
    /// headers are trusted or any handler runs. A failed check produces 401
    /// with no side effects. 2xx acknowledges; anything else makes Shopify
    /// redeliver, so handlers must tolerate replays.
    pub async fn dispatch(&self, headers: &HeaderMap, body: Bytes) -> StatusCode {
        let signature = headers.get(HMAC_HEADER).and_then(|v| v.to_str().ok());

        if !verify_webhook_signature(&self.api_secret, &body, signature) {
            tracing::warn!("Webhook signature verification failed");
            return StatusCode::UNAUTHORIZED;
        }

        let Some(topic) = headers.get(TOPIC_HEADER).and_then(|v| v.to_str().ok()) else {
            return StatusCode::BAD_REQUEST;
        };
        let topic = topic_key(topic);

        let Some(handler) = self.handlers.get(&topic) else {
            tracing::info!(topic, "No handler for webhook topic, acknowledging");
            return StatusCode::OK;
        };

        // The shop header is only needed once a handler will run, so an
        // unhandled topic is acknowledged even if the header is junk.
        let shop = headers
            .get(SHOP_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|raw| ShopDomain::parse(raw).ok());
        let Some(shop) = shop else {
            tracing::warn!(topic, "Webhook delivery with missing or invalid shop header");
            return StatusCode::BAD_REQUEST;
        };

        let context = WebhookContext {
            topic: topic.clone(),
            shop: shop.clone(),
            body,
        };

        match handler(context).await {
            Ok(()) => {
                tracing::info!(topic, shop = %shop, "Webhook handled");
                StatusCode::OK
            }
            Err(err) => {
                sentry::capture_error(&err);
                tracing::error!(topic, shop = %shop, error = %err, "Webhook handler failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Build the registry with the handlers every deployment needs.
#[must_use]
pub fn registry_with_defaults(api_secret: &str, pool: SqlitePool) -> WebhookRegistry {
    let mut builder = WebhookRegistryBuilder::new(api_secret);

    let uninstall_pool = pool.clone();
    builder.add_handler("APP_UNINSTALLED", move |ctx| {
        let pool = uninstall_pool.clone();
        Box::pin(async move {
            InstallationRepository::new(&pool).delete(&ctx.shop).await?;
            SessionRepository::new(&pool).delete(&ctx.shop).await?;
            MerchantRepository::new(&pool).delete(&ctx.shop).await?;
            tracing::info!(shop = %ctx.shop, "Uninstall processed, shop state cleared");
            Ok(())
        })
    });

    for topic in [
        "CUSTOMERS_DATA_REQUEST",
        "CUSTOMERS_REDACT",
        "SHOP_REDACT",
    ] {
        builder.add_handler(topic, move |ctx| {
            Box::pin(async move { compliance::handle(&ctx) })
        });
    }

    builder.add_handler("FULFILLMENTS_CREATE", move |ctx| {
        Box::pin(async move { fulfillment::handle(&ctx) })
    });

    builder.build()
}
