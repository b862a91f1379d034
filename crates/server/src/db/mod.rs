//! Database operations for the embedded app.
//!
//! # Database: sqlite (`database.sqlite`)
//!
//! Stores per-shop state only (Shopify is source of truth for billing):
//!
//! ## Tables
//!
//! - `shopify_session` - Offline OAuth session per shop
//! - `app_installation` - Set membership: shop has the app installed
//! - `merchant` - Per-shop record with billing line-item reference
//! - `product_memo` - Per-product memos owned by a shop
//! - `tower_sessions` - Browser session storage (created by the session store)
//!
//! # Migrations
//!
//! Migrations are embedded from `crates/server/migrations/` and run on
//! startup via [`MIGRATOR`].

pub mod installations;
pub mod merchants;
pub mod sessions;

use std::str::FromStr;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

pub use installations::InstallationRepository;
pub use merchants::MerchantRepository;
pub use sessions::SessionRepository;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

/// Create a sqlite connection pool with sensible defaults.
///
/// The database file is created if missing; installation state must survive
/// restarts, so an in-memory database is only appropriate in tests.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url.expose_secret())?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}
