//! # Bar Repository
//!
//! Bars (tenants) and their invitation codes.
//!
//! `invitation_code` carries a unique index, so two bars can never share a
//! code even when two owners race to create one. A losing insert surfaces as
//! [`DbError::UniqueViolation`] and the caller draws a new code.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use maquis_core::Bar;

/// Repository for bar database operations.
#[derive(Debug, Clone)]
pub struct BarRepository {
    pool: SqlitePool,
}

impl BarRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BarRepository { pool }
    }

    pub async fn insert<'e, E>(&self, executor: E, bar: &Bar) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %bar.id, owner_id = %bar.owner_id, "Inserting bar");

        sqlx::query(
            r#"
            INSERT INTO bars (
                id, owner_id, name, description, address, phone,
                invitation_code, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&bar.id)
        .bind(&bar.owner_id)
        .bind(&bar.name)
        .bind(&bar.description)
        .bind(&bar.address)
        .bind(&bar.phone)
        .bind(&bar.invitation_code)
        .bind(bar.created_at)
        .bind(bar.updated_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<Bar>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, "Getting bar by ID");

        let bar = sqlx::query_as::<_, Bar>("SELECT * FROM bars WHERE id = ?1")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(bar)
    }

    /// Looks up a bar by its (already normalized) invitation code.
    pub async fn find_by_code<'e, E>(&self, executor: E, code: &str) -> DbResult<Option<Bar>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!("Looking up bar by invitation code");

        let bar = sqlx::query_as::<_, Bar>("SELECT * FROM bars WHERE invitation_code = ?1")
            .bind(code)
            .fetch_optional(executor)
            .await?;

        Ok(bar)
    }

    pub async fn code_exists<'e, E>(&self, executor: E, code: &str) -> DbResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM bars WHERE invitation_code = ?1)")
                .bind(code)
                .fetch_one(executor)
                .await?;

        Ok(exists)
    }

    /// Writes the editable details of a bar and returns the stored row.
    pub async fn update_details<'e, E>(&self, executor: E, bar: &Bar) -> DbResult<Option<Bar>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %bar.id, "Updating bar details");

        let updated = sqlx::query_as::<_, Bar>(
            r#"
            UPDATE bars
            SET name = ?1, description = ?2, address = ?3, phone = ?4, updated_at = ?5
            WHERE id = ?6
            RETURNING *
            "#,
        )
        .bind(&bar.name)
        .bind(&bar.description)
        .bind(&bar.address)
        .bind(&bar.phone)
        .bind(bar.updated_at)
        .bind(&bar.id)
        .fetch_optional(executor)
        .await?;

        Ok(updated)
    }

    /// Replaces a bar's invitation code. The old code stops working at once.
    pub async fn update_invitation_code<'e, E>(
        &self,
        executor: E,
        id: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<Bar>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, "Rotating invitation code");

        let updated = sqlx::query_as::<_, Bar>(
            "UPDATE bars SET invitation_code = ?1, updated_at = ?2 WHERE id = ?3 RETURNING *",
        )
        .bind(code)
        .bind(now)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(updated)
    }

    /// Bars `user_id` owns or holds an active membership in.
    ///
    /// Each bar appears once even when the user is both owner and member.
    pub async fn list_accessible(&self, user_id: &str) -> DbResult<Vec<Bar>> {
        debug!(user_id = %user_id, "Listing accessible bars");

        let bars = sqlx::query_as::<_, Bar>(
            r#"
            SELECT b.*
            FROM bars b
            WHERE b.owner_id = ?1
               OR EXISTS (
                    SELECT 1 FROM bar_members m
                    WHERE m.bar_id = b.id AND m.user_id = ?1 AND m.is_active = 1
               )
            ORDER BY b.name COLLATE NOCASE, b.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{membership, seed_bar, test_db};
    use crate::DbError;
    use maquis_core::Role;

    #[tokio::test]
    async fn test_insert_and_find() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "ABCD1234").await;

        let found = db.bars().find_by_id(db.pool(), &bar.id).await.unwrap();
        assert_eq!(found.unwrap().name, "Chez Tantie");

        let by_code = db.bars().find_by_code(db.pool(), "ABCD1234").await.unwrap();
        assert_eq!(by_code.unwrap().id, bar.id);

        assert!(db.bars().code_exists(db.pool(), "ABCD1234").await.unwrap());
        assert!(!db.bars().code_exists(db.pool(), "ZZZZ9999").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = test_db().await;
        seed_bar(&db, "owner-1", "Le Baobab", "SAME0001").await;

        let clash = crate::repository::test_support::bar("owner-2", "Le Fromager", "SAME0001");
        let err = db.bars().insert(db.pool(), &clash).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_list_accessible_is_deduplicated_and_sorted() {
        let db = test_db().await;
        let zebra = seed_bar(&db, "user-1", "Zebra Club", "CODE0001").await;
        let alpha = seed_bar(&db, "owner-2", "alpha lounge", "CODE0002").await;
        let other = seed_bar(&db, "owner-3", "Maquis du Coin", "CODE0003").await;

        // Owner of zebra, also listed as a member of it.
        let members = db.members();
        members
            .insert(db.pool(), &membership(&zebra.id, "user-1", Role::Owner))
            .await
            .unwrap();
        members
            .insert(db.pool(), &membership(&alpha.id, "user-1", Role::Waiter))
            .await
            .unwrap();
        let mut inactive = membership(&other.id, "user-1", Role::Cashier);
        inactive.is_active = false;
        members.insert(db.pool(), &inactive).await.unwrap();

        let bars = db.bars().list_accessible("user-1").await.unwrap();
        let names: Vec<&str> = bars.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["alpha lounge", "Zebra Club"]);
    }

    #[tokio::test]
    async fn test_rotate_code() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "OLDC0DE1").await;

        let updated = db
            .bars()
            .update_invitation_code(db.pool(), &bar.id, "NEWC0DE1", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.invitation_code, "NEWC0DE1");
        assert!(db.bars().find_by_code(db.pool(), "OLDC0DE1").await.unwrap().is_none());
    }
}
