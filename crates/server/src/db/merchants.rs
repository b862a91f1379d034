//! Merchant repository.
//!
//! One row per shop, created lazily on the first gated request after install.
//! The Billing Reconciler writes the usage line-item id here when a charge
//! completes; the discount flag is a read-only input to billing decisions.

use std::collections::HashMap;

use sqlx::SqlitePool;

use memodeck_core::ShopDomain;

use super::RepositoryError;
use crate::models::merchant::Merchant;

/// Internal row type for sqlite queries.
#[derive(Debug, sqlx::FromRow)]
struct MerchantRow {
    shop: String,
    access_token: String,
    usage_sub_id: Option<String>,
    discount: bool,
}

impl TryFrom<MerchantRow> for Merchant {
    type Error = RepositoryError;

    fn try_from(row: MerchantRow) -> Result<Self, Self::Error> {
        let shop = ShopDomain::parse(&row.shop).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid shop domain in database: {e}"))
        })?;

        Ok(Self {
            shop,
            access_token: row.access_token,
            usage_sub_id: row.usage_sub_id,
            discount: row.discount,
        })
    }
}

/// Repository for merchant database operations.
pub struct MerchantRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MerchantRepository<'a> {
    /// Create a new merchant repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the merchant record for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored shop domain is invalid.
    pub async fn get(&self, shop: &ShopDomain) -> Result<Option<Merchant>, RepositoryError> {
        let row: Option<MerchantRow> = sqlx::query_as(
            r"
            SELECT shop, access_token, usage_sub_id, discount
            FROM merchant
            WHERE shop = ?1
            ",
        )
        .bind(shop.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Merchant::try_from).transpose()
    }

    /// Get the merchant record for a shop, creating it if absent.
    ///
    /// The access token mirrors the session token at creation time and is
    /// deliberately not refreshed here; the session row stays authoritative.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_or_create(
        &self,
        shop: &ShopDomain,
        access_token: &str,
    ) -> Result<Merchant, RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO merchant (shop, access_token)
            VALUES (?1, ?2)
            ON CONFLICT(shop) DO NOTHING
            ",
        )
        .bind(shop.as_str())
        .bind(access_token)
        .execute(self.pool)
        .await?;

        self.get(shop).await?.ok_or(RepositoryError::NotFound)
    }

    /// Store the usage line-item id after a subscription was created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the merchant doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_usage_sub_id(
        &self,
        shop: &ShopDomain,
        usage_sub_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE merchant
            SET usage_sub_id = ?1, updated_at = datetime('now')
            WHERE shop = ?2
            ",
        )
        .bind(usage_sub_id)
        .bind(shop.as_str())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Set the discount eligibility flag for a shop.
    ///
    /// Owned by an external collaborator; exposed here so that collaborator
    /// (and tests) can flip it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the merchant doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_discount(
        &self,
        shop: &ShopDomain,
        discount: bool,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE merchant
            SET discount = ?1, updated_at = datetime('now')
            WHERE shop = ?2
            ",
        )
        .bind(discount)
        .bind(shop.as_str())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Upsert a batch of per-product memos for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn upsert_memos(
        &self,
        shop: &ShopDomain,
        memos: &HashMap<String, String>,
    ) -> Result<(), RepositoryError> {
        for (product_id, memo) in memos {
            sqlx::query(
                r"
                INSERT INTO product_memo (shop, product_id, memo)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(shop, product_id) DO UPDATE SET
                    memo = excluded.memo,
                    updated_at = datetime('now')
                ",
            )
            .bind(shop.as_str())
            .bind(product_id)
            .bind(memo)
            .execute(self.pool)
            .await?;
        }

        Ok(())
    }

    /// All memos for a shop, keyed by product id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn memos(&self, shop: &ShopDomain) -> Result<HashMap<String, String>, RepositoryError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT product_id, memo FROM product_memo WHERE shop = ?1")
                .bind(shop.as_str())
                .fetch_all(self.pool)
                .await?;

        Ok(rows.into_iter().collect())
    }

    /// Delete the merchant record and its memos (uninstall cleanup).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn delete(&self, shop: &ShopDomain) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM product_memo WHERE shop = ?1")
            .bind(shop.as_str())
            .execute(self.pool)
            .await?;
        sqlx::query("DELETE FROM merchant WHERE shop = ?1")
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
    async fn get_or_create_is_lazy_and_stable() {
        let pool = memory_pool().await;
        let repo = MerchantRepository::new(&pool);
        let shop = ShopDomain::parse("test.myshopify.com").unwrap();

        assert!(repo.get(&shop).await.unwrap().is_none());

        let created = repo.get_or_create(&shop, "token-1").await.unwrap();
        assert_eq!(created.access_token, "token-1");
        assert!(created.usage_sub_id.is_none());
        assert!(!created.discount);

        // A second call must not overwrite the existing row.
        let again = repo.get_or_create(&shop, "token-2").await.unwrap();
        assert_eq!(again.access_token, "token-1");
    }

    #[tokio::test]
    async fn set_usage_sub_id_persists() {
        let pool = memory_pool().await;
        let repo = MerchantRepository::new(&pool);
        let shop = ShopDomain::parse("test.myshopify.com").unwrap();

        repo.get_or_create(&shop, "token").await.unwrap();
        repo.set_usage_sub_id(&shop, "gid://shopify/AppSubscriptionLineItem/42")
            .await
            .unwrap();

        let merchant = repo.get(&shop).await.unwrap().unwrap();
        assert_eq!(
            merchant.usage_sub_id.as_deref(),
            Some("gid://shopify/AppSubscriptionLineItem/42")
        );
    }

    #[tokio::test]
    async fn set_usage_sub_id_without_merchant_is_not_found() {
        let pool = memory_pool().await;
        let repo = MerchantRepository::new(&pool);
        let shop = ShopDomain::parse("test.myshopify.com").unwrap();

        let err = repo.set_usage_sub_id(&shop, "line-item").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn memo_upsert_roundtrips() {
        let pool = memory_pool().await;
        let repo = MerchantRepository::new(&pool);
        let shop = ShopDomain::parse("test.myshopify.com").unwrap();
        repo.get_or_create(&shop, "token").await.unwrap();

        let mut memos = HashMap::new();
        memos.insert("prod-1".to_string(), "restock friday".to_string());
        memos.insert("prod-2".to_string(), "discontinued".to_string());
        repo.upsert_memos(&shop, &memos).await.unwrap();

        // Overwrite one entry.
        let mut update = HashMap::new();
        update.insert("prod-1".to_string(), "restock monday".to_string());
        repo.upsert_memos(&shop, &update).await.unwrap();

        let stored = repo.memos(&shop).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored.get("prod-1").map(String::as_str), Some("restock monday"));
        assert_eq!(stored.get("prod-2").map(String::as_str), Some("discontinued"));
    }

    #[tokio::test]
    async fn discount_flag_roundtrips() {
        let pool = memory_pool().await;
        let repo = MerchantRepository::new(&pool);
        let shop = ShopDomain::parse("test.myshopify.com").unwrap();

        repo.get_or_create(&shop, "token").await.unwrap();
        repo.set_discount(&shop, true).await.unwrap();

        let merchant = repo.get(&shop).await.unwrap().unwrap();
        assert!(merchant.discount);
    }
}
