//! # Inventory Repository
//!
//! Append-only ledger of stock movements. Triggers in the schema reject any
//! UPDATE or DELETE on `inventory_movements`.

use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use maquis_core::InventoryMovement;

/// Repository for inventory movement operations.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    pub async fn insert<'e, E>(&self, executor: E, movement: &InventoryMovement) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(
            product_id = %movement.product_id,
            movement_type = movement.movement_type.as_str(),
            quantity = movement.quantity,
            "Recording inventory movement"
        );

        sqlx::query(
            r#"
            INSERT INTO inventory_movements (
                id, bar_id, product_id, movement_type, quantity,
                reason, reference_id, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.bar_id)
        .bind(&movement.product_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(&movement.reason)
        .bind(&movement.reference_id)
        .bind(&movement.created_by)
        .bind(movement.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Movements of one product, newest first.
    pub async fn list_for_product(
        &self,
        product_id: &str,
        limit: i64,
    ) -> DbResult<Vec<InventoryMovement>> {
        debug!(product_id = %product_id, limit, "Listing movements");

        let movements = sqlx::query_as::<_, InventoryMovement>(
            r#"
            SELECT * FROM inventory_movements
            WHERE product_id = ?1
            ORDER BY created_at DESC, id
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Movements caused by one order (or other reference).
    pub async fn list_for_reference<'e, E>(
        &self,
        executor: E,
        reference_id: &str,
    ) -> DbResult<Vec<InventoryMovement>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let movements = sqlx::query_as::<_, InventoryMovement>(
            "SELECT * FROM inventory_movements WHERE reference_id = ?1 ORDER BY created_at, id",
        )
        .bind(reference_id)
        .fetch_all(executor)
        .await?;

        Ok(movements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{product, seed_bar, test_db};
    use crate::DbError;
    use chrono::Utc;
    use maquis_core::MovementType;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_ledger_is_append_only() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "ABCD1234").await;
        let castel = product(&bar.id, "Castel", 1000, 10);
        db.products().insert(db.pool(), &castel).await.unwrap();

        let movement = InventoryMovement {
            id: Uuid::new_v4().to_string(),
            bar_id: bar.id.clone(),
            product_id: castel.id.clone(),
            movement_type: MovementType::In,
            quantity: 24,
            reason: Some("livraison".to_string()),
            reference_id: None,
            created_by: Some("owner-1".to_string()),
            created_at: Utc::now(),
        };
        db.inventory().insert(db.pool(), &movement).await.unwrap();

        let listed = db.inventory().list_for_product(&castel.id, 50).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, movement.id);
        assert_eq!(listed[0].movement_type, MovementType::In);
        assert_eq!(listed[0].quantity, 24);

        let err = sqlx::query("DELETE FROM inventory_movements WHERE id = ?1")
            .bind(&movement.id)
            .execute(db.pool())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(err.to_string().contains("append-only"));
    }
}
