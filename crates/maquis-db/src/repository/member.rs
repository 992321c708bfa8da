//! # Member Repository
//!
//! Memberships link a user to a bar with a role. `(bar_id, user_id)` is
//! unique; memberships are deactivated, never deleted.

use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use maquis_core::{Membership, Role};

/// Repository for membership database operations.
#[derive(Debug, Clone)]
pub struct MemberRepository {
    pool: SqlitePool,
}

impl MemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MemberRepository { pool }
    }

    pub async fn insert<'e, E>(&self, executor: E, member: &Membership) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(bar_id = %member.bar_id, user_id = %member.user_id, role = %member.role, "Inserting membership");

        sqlx::query(
            r#"
            INSERT INTO bar_members (id, bar_id, user_id, role, is_active, joined_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&member.id)
        .bind(&member.bar_id)
        .bind(&member.user_id)
        .bind(member.role)
        .bind(member.is_active)
        .bind(member.joined_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// The membership of `user_id` in `bar_id`, active or not.
    pub async fn find<'e, E>(
        &self,
        executor: E,
        bar_id: &str,
        user_id: &str,
    ) -> DbResult<Option<Membership>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let member = sqlx::query_as::<_, Membership>(
            "SELECT * FROM bar_members WHERE bar_id = ?1 AND user_id = ?2",
        )
        .bind(bar_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(member)
    }

    /// Members of a bar, owners first, then by join date.
    pub async fn list_for_bar(&self, bar_id: &str) -> DbResult<Vec<Membership>> {
        debug!(bar_id = %bar_id, "Listing members");

        let members = sqlx::query_as::<_, Membership>(
            r#"
            SELECT * FROM bar_members
            WHERE bar_id = ?1
            ORDER BY CASE role WHEN 'owner' THEN 0 WHEN 'cashier' THEN 1 ELSE 2 END,
                     joined_at, id
            "#,
        )
        .bind(bar_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    pub async fn set_active<'e, E>(
        &self,
        executor: E,
        bar_id: &str,
        user_id: &str,
        active: bool,
    ) -> DbResult<Option<Membership>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(bar_id = %bar_id, user_id = %user_id, active, "Setting membership active flag");

        let member = sqlx::query_as::<_, Membership>(
            r#"
            UPDATE bar_members SET is_active = ?1
            WHERE bar_id = ?2 AND user_id = ?3
            RETURNING *
            "#,
        )
        .bind(active)
        .bind(bar_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(member)
    }

    pub async fn set_role<'e, E>(
        &self,
        executor: E,
        bar_id: &str,
        user_id: &str,
        role: Role,
    ) -> DbResult<Option<Membership>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(bar_id = %bar_id, user_id = %user_id, role = %role, "Changing member role");

        let member = sqlx::query_as::<_, Membership>(
            r#"
            UPDATE bar_members SET role = ?1
            WHERE bar_id = ?2 AND user_id = ?3
            RETURNING *
            "#,
        )
        .bind(role)
        .bind(bar_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{membership, seed_bar, test_db};
    use crate::DbError;

    #[tokio::test]
    async fn test_membership_is_unique_per_bar() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "ABCD1234").await;

        db.members()
            .insert(db.pool(), &membership(&bar.id, "user-1", Role::Waiter))
            .await
            .unwrap();
        let err = db
            .members()
            .insert(db.pool(), &membership(&bar.id, "user-1", Role::Cashier))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_deactivate_and_promote() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "ABCD1234").await;
        let repo = db.members();
        repo.insert(db.pool(), &membership(&bar.id, "owner-1", Role::Owner))
            .await
            .unwrap();
        repo.insert(db.pool(), &membership(&bar.id, "user-1", Role::Waiter))
            .await
            .unwrap();

        let promoted = repo
            .set_role(db.pool(), &bar.id, "user-1", Role::Cashier)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(promoted.role, Role::Cashier);

        let inactive = repo
            .set_active(db.pool(), &bar.id, "user-1", false)
            .await
            .unwrap()
            .unwrap();
        assert!(!inactive.is_active);

        let listed = repo.list_for_bar(&bar.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].role, Role::Owner);

        assert!(repo
            .set_active(db.pool(), &bar.id, "nobody", false)
            .await
            .unwrap()
            .is_none());
    }
}
