//! # Product Repository
//!
//! The menu of each bar and its stock levels.
//!
//! ## Stock Guard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE products                                                        │
//! │  SET stock_quantity = stock_quantity + :delta                           │
//! │  WHERE id = :id AND stock_quantity + :delta >= 0                        │
//! │                                                                         │
//! │  rows_affected = 1  →  applied                                          │
//! │  rows_affected = 0  →  would go negative; nothing written               │
//! │                                                                         │
//! │  The check and the write are one statement, so two waiters serving     │
//! │  the last bottle at the same time cannot both succeed.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use maquis_core::Product;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    pub async fn insert<'e, E>(&self, executor: E, product: &Product) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %product.id, bar_id = %product.bar_id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, bar_id, name, description,
                sale_price, cost_price, stock_quantity, low_stock_threshold,
                unit, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&product.id)
        .bind(&product.bar_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.sale_price)
        .bind(product.cost_price)
        .bind(product.stock_quantity)
        .bind(product.low_stock_threshold)
        .bind(&product.unit)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<Product>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, "Getting product by ID");

        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(product)
    }

    /// Writes the catalogue fields of a product. Stock is never written here;
    /// it only moves through [`ProductRepository::adjust_stock`].
    pub async fn update<'e, E>(&self, executor: E, product: &Product) -> DbResult<Option<Product>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %product.id, "Updating product");

        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = ?1, description = ?2, sale_price = ?3, cost_price = ?4,
                low_stock_threshold = ?5, unit = ?6, is_active = ?7, updated_at = ?8
            WHERE id = ?9
            RETURNING *
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.sale_price)
        .bind(product.cost_price)
        .bind(product.low_stock_threshold)
        .bind(&product.unit)
        .bind(product.is_active)
        .bind(product.updated_at)
        .bind(&product.id)
        .fetch_optional(executor)
        .await?;

        Ok(updated)
    }

    /// Applies a signed stock delta unless it would drive stock below zero.
    ///
    /// Returns the updated product, or `None` when the guard rejected the
    /// change (or the product does not exist).
    pub async fn adjust_stock<'e, E>(
        &self,
        executor: E,
        id: &str,
        delta: i64,
        now: DateTime<Utc>,
    ) -> DbResult<Option<Product>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, delta, "Adjusting stock");

        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?1, updated_at = ?2
            WHERE id = ?3 AND stock_quantity + ?1 >= 0
            RETURNING *
            "#,
        )
        .bind(delta)
        .bind(now)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(updated)
    }

    /// Products of a bar ordered by name.
    pub async fn list_for_bar(&self, bar_id: &str, include_inactive: bool) -> DbResult<Vec<Product>> {
        debug!(bar_id = %bar_id, include_inactive, "Listing products");

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE bar_id = ?1 AND (?2 OR is_active = 1)
            ORDER BY name COLLATE NOCASE, id
            "#,
        )
        .bind(bar_id)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Active products at or below their low-stock threshold, emptiest first.
    pub async fn list_low_stock(&self, bar_id: &str) -> DbResult<Vec<Product>> {
        debug!(bar_id = %bar_id, "Listing low-stock products");

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE bar_id = ?1 AND is_active = 1 AND stock_quantity <= low_stock_threshold
            ORDER BY stock_quantity, name COLLATE NOCASE
            "#,
        )
        .bind(bar_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{product, seed_bar, test_db};

    #[tokio::test]
    async fn test_stock_guard() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "ABCD1234").await;
        let flag = product(&bar.id, "Flag 65cl", 1000, 3);
        db.products().insert(db.pool(), &flag).await.unwrap();

        let after = db
            .products()
            .adjust_stock(db.pool(), &flag.id, -2, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.stock_quantity, 1);

        let rejected = db
            .products()
            .adjust_stock(db.pool(), &flag.id, -2, Utc::now())
            .await
            .unwrap();
        assert!(rejected.is_none());

        let stored = db.products().find_by_id(db.pool(), &flag.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 1);
    }

    #[tokio::test]
    async fn test_low_stock_and_inactive_listing() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "ABCD1234").await;
        let repo = db.products();

        let low = product(&bar.id, "Castel", 1000, 2);
        let plenty = product(&bar.id, "Beaufort", 1000, 48);
        let mut gone = product(&bar.id, "Guinness", 1500, 0);
        gone.is_active = false;
        for p in [&low, &plenty, &gone] {
            repo.insert(db.pool(), p).await.unwrap();
        }

        let low_stock = repo.list_low_stock(&bar.id).await.unwrap();
        assert_eq!(low_stock.len(), 1);
        assert_eq!(low_stock[0].id, low.id);

        assert_eq!(repo.list_for_bar(&bar.id, false).await.unwrap().len(), 2);
        assert_eq!(repo.list_for_bar(&bar.id, true).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_keeps_stock() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "ABCD1234").await;
        let mut castel = product(&bar.id, "Castel", 1000, 10);
        db.products().insert(db.pool(), &castel).await.unwrap();

        castel.sale_price = 1100;
        castel.stock_quantity = 999;
        let updated = db.products().update(db.pool(), &castel).await.unwrap().unwrap();
        assert_eq!(updated.sale_price, 1100);
        assert_eq!(updated.stock_quantity, 10);
    }
}
