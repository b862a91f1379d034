//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::shopify::AdminClient;
use crate::webhooks::{WebhookRegistry, registry_with_defaults};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: SqlitePool,
    shopify: AdminClient,
    webhooks: WebhookRegistry,
}

impl AppState {
    /// Create a new application state with the default webhook handlers.
    #[must_use]
    pub fn new(config: AppConfig, pool: SqlitePool) -> Self {
        let shopify = AdminClient::new(&config.shopify, config.webhook_callback_url());
        let webhooks = registry_with_defaults(shopify.api_secret(), pool.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                shopify,
                webhooks,
            }),
        }
    }

    /// Get a reference to the app configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    /// Get a reference to the Shopify Admin API client.
    #[must_use]
    pub fn shopify(&self) -> &AdminClient {
        &self.inner.shopify
    }

    /// Get a reference to the webhook registry.
    #[must_use]
    pub fn webhooks(&self) -> &WebhookRegistry {
        &self.inner.webhooks
    }
}
