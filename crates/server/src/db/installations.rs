//! Installation set repository.
//!
//! Durable set of shop domains that currently have the app installed. This
//! predicate gates every request after a restart, so it lives in sqlite, not
//! memory. Insert and delete are idempotent: the auth-completion path and the
//! uninstall-webhook path may interleave or redeliver without tearing state.

use sqlx::SqlitePool;

use memodeck_core::ShopDomain;

use super::RepositoryError;

/// Repository for installation set database operations.
pub struct InstallationRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> InstallationRepository<'a> {
    /// Create a new installation repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Check whether a shop currently has the app installed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn includes(&self, shop: &ShopDomain) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM app_installation WHERE shop = ?1)")
                .bind(shop.as_str())
                .fetch_one(self.pool)
                .await?;

        Ok(exists)
    }

    /// Mark a shop as installed. Adding an already-present shop is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add(&self, shop: &ShopDomain) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO app_installation (shop) VALUES (?1) ON CONFLICT(shop) DO NOTHING")
            .bind(shop.as_str())
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Mark a shop as uninstalled. Deleting an absent shop is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, shop: &ShopDomain) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM app_installation WHERE shop = ?1")
            .bind(shop.as_str())
            .execute(self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    #[tokio::test]
    async fn add_then_includes() {
        let pool = memory_pool().await;
        let repo = InstallationRepository::new(&pool);
        let shop = ShopDomain::parse("test.myshopify.com").unwrap();

        assert!(!repo.includes(&shop).await.unwrap());
        repo.add(&shop).await.unwrap();
        assert!(repo.includes(&shop).await.unwrap());
    }

    #[tokio::test]
    async fn add_is_idempotent() {
        let pool = memory_pool().await;
        let repo = InstallationRepository::new(&pool);
        let shop = ShopDomain::parse("test.myshopify.com").unwrap();

        repo.add(&shop).await.unwrap();
        repo.add(&shop).await.unwrap();
        assert!(repo.includes(&shop).await.unwrap());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let pool = memory_pool().await;
        let repo = InstallationRepository::new(&pool);
        let shop = ShopDomain::parse("test.myshopify.com").unwrap();

        repo.add(&shop).await.unwrap();
        repo.delete(&shop).await.unwrap();
        assert!(!repo.includes(&shop).await.unwrap());

        // Redelivered uninstall must leave the same end state.
        repo.delete(&shop).await.unwrap();
        assert!(!repo.includes(&shop).await.unwrap());
    }

    #[tokio::test]
    async fn membership_is_per_shop() {
        let pool = memory_pool().await;
        let repo = InstallationRepository::new(&pool);
        let a = ShopDomain::parse("alpha.myshopify.com").unwrap();
        let b = ShopDomain::parse("beta.myshopify.com").unwrap();

        repo.add(&a).await.unwrap();
        assert!(repo.includes(&a).await.unwrap());
        assert!(!repo.includes(&b).await.unwrap());
    }
}
