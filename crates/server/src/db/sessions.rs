//! Offline session repository.
//!
//! One row per shop: the persistent (offline) access token obtained during
//! the install handshake. A fresh handshake for the same shop supersedes the
//! previous row via upsert, so "at most one active session per shop" holds by
//! construction.

use sqlx::SqlitePool;

use memodeck_core::ShopDomain;

use super::RepositoryError;
use crate::models::session::OfflineSession;

/// Internal row type for sqlite queries.
#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    shop: String,
    access_token: String,
    scope: String,
    is_online: bool,
    obtained_at: i64,
}

impl TryFrom<SessionRow> for OfflineSession {
    type Error = RepositoryError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let shop = ShopDomain::parse(&row.shop).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid shop domain in database: {e}"))
        })?;

        Ok(Self {
            shop,
            access_token: row.access_token,
            scope: row.scope,
            is_online: row.is_online,
            obtained_at: row.obtained_at,
        })
    }
}

/// Repository for offline session database operations.
pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new session repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the session for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored shop domain is invalid.
    pub async fn get(&self, shop: &ShopDomain) -> Result<Option<OfflineSession>, RepositoryError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r"
            SELECT shop, access_token, scope, is_online, obtained_at
            FROM shopify_session
            WHERE shop = ?1
            ",
        )
        .bind(shop.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(OfflineSession::try_from).transpose()
    }

    /// Save or replace the session for a shop.
    ///
    /// Uses upsert so a repeated handshake overwrites the old record
    /// (same key, last write wins).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save(&self, session: &OfflineSession) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shopify_session (shop, access_token, scope, is_online, obtained_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(shop) DO UPDATE SET
                access_token = excluded.access_token,
                scope = excluded.scope,
                is_online = excluded.is_online,
                obtained_at = excluded.obtained_at
            ",
        )
        .bind(session.shop.as_str())
        .bind(&session.access_token)
        .bind(&session.scope)
        .bind(session.is_online)
        .bind(session.obtained_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete the session for a shop.
    ///
    /// Returns `true` if a session was deleted, `false` if none existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, shop: &ShopDomain) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shopify_session WHERE shop = ?1")
            .bind(shop.as_str())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    fn session(shop: &str, token: &str) -> OfflineSession {
        OfflineSession {
            shop: ShopDomain::parse(shop).unwrap(),
            access_token: token.to_string(),
            scope: "write_products".to_string(),
            is_online: false,
            obtained_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn save_then_get_roundtrips() {
        let pool = memory_pool().await;
        let repo = SessionRepository::new(&pool);

        repo.save(&session("test.myshopify.com", "token-1"))
            .await
            .unwrap();

        let loaded = repo
            .get(&ShopDomain::parse("test.myshopify.com").unwrap())
            .await
            .unwrap()
            .expect("session present");
        assert_eq!(loaded.access_token, "token-1");
        assert!(!loaded.is_online);
    }

    #[tokio::test]
    async fn second_save_supersedes_first() {
        let pool = memory_pool().await;
        let repo = SessionRepository::new(&pool);
        let shop = ShopDomain::parse("test.myshopify.com").unwrap();

        repo.save(&session("test.myshopify.com", "token-1"))
            .await
            .unwrap();
        repo.save(&session("test.myshopify.com", "token-2"))
            .await
            .unwrap();

        let loaded = repo.get(&shop).await.unwrap().expect("session present");
        assert_eq!(loaded.access_token, "token-2");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let pool = memory_pool().await;
        let repo = SessionRepository::new(&pool);
        let shop = ShopDomain::parse("test.myshopify.com").unwrap();

        repo.save(&session("test.myshopify.com", "token-1"))
            .await
            .unwrap();
        assert!(repo.delete(&shop).await.unwrap());
        assert!(!repo.delete(&shop).await.unwrap());
        assert!(repo.get(&shop).await.unwrap().is_none());
    }
}
