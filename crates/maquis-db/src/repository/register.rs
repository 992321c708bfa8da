//! # Register Repository
//!
//! Cash drawer sessions.
//!
//! ```text
//! open   INSERT ... status = 'open'
//!        └── partial unique index (bar_id, cashier_id) WHERE status = 'open'
//!            rejects a second open drawer for the same cashier
//!
//! close  UPDATE ... SET status = 'closed', ... WHERE id = ? AND status = 'open'
//!        └── a second close finds no open row and writes nothing
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use maquis_core::CashRegister;

/// Figures written when a drawer is closed.
#[derive(Debug, Clone)]
pub struct RegisterClosing<'a> {
    pub closing_amount: i64,
    pub expected_amount: i64,
    pub variance: i64,
    pub notes: Option<&'a str>,
    pub closed_at: DateTime<Utc>,
}

/// Repository for drawer session operations.
#[derive(Debug, Clone)]
pub struct RegisterRepository {
    pool: SqlitePool,
}

impl RegisterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RegisterRepository { pool }
    }

    pub async fn insert<'e, E>(&self, executor: E, register: &CashRegister) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %register.id, bar_id = %register.bar_id, cashier_id = %register.cashier_id, "Opening cash register");

        sqlx::query(
            r#"
            INSERT INTO cash_registers (
                id, bar_id, cashier_id, opening_amount,
                closing_amount, expected_amount, variance,
                status, opened_at, closed_at, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&register.id)
        .bind(&register.bar_id)
        .bind(&register.cashier_id)
        .bind(register.opening_amount)
        .bind(register.closing_amount)
        .bind(register.expected_amount)
        .bind(register.variance)
        .bind(register.status)
        .bind(register.opened_at)
        .bind(register.closed_at)
        .bind(&register.notes)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<CashRegister>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, "Getting cash register by ID");

        let register = sqlx::query_as::<_, CashRegister>("SELECT * FROM cash_registers WHERE id = ?1")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(register)
    }

    /// The open session of a cashier in a bar, if any.
    pub async fn find_open<'e, E>(
        &self,
        executor: E,
        bar_id: &str,
        cashier_id: &str,
    ) -> DbResult<Option<CashRegister>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let register = sqlx::query_as::<_, CashRegister>(
            r#"
            SELECT * FROM cash_registers
            WHERE bar_id = ?1 AND cashier_id = ?2 AND status = 'open'
            "#,
        )
        .bind(bar_id)
        .bind(cashier_id)
        .fetch_optional(executor)
        .await?;

        Ok(register)
    }

    /// Closes a session that is still open.
    ///
    /// Returns `None` when the session is already closed (or unknown).
    pub async fn close<'e, E>(
        &self,
        executor: E,
        id: &str,
        closing: &RegisterClosing<'_>,
    ) -> DbResult<Option<CashRegister>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, closing_amount = closing.closing_amount, variance = closing.variance, "Closing cash register");

        let register = sqlx::query_as::<_, CashRegister>(
            r#"
            UPDATE cash_registers
            SET status = 'closed',
                closing_amount = ?1,
                expected_amount = ?2,
                variance = ?3,
                notes = COALESCE(?4, notes),
                closed_at = ?5
            WHERE id = ?6 AND status = 'open'
            RETURNING *
            "#,
        )
        .bind(closing.closing_amount)
        .bind(closing.expected_amount)
        .bind(closing.variance)
        .bind(closing.notes)
        .bind(closing.closed_at)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(register)
    }

    /// Sessions of a bar opened in `[from, to)`, newest first.
    pub async fn list_for_bar(
        &self,
        bar_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<CashRegister>> {
        debug!(bar_id = %bar_id, "Listing cash registers");

        let registers = sqlx::query_as::<_, CashRegister>(
            r#"
            SELECT * FROM cash_registers
            WHERE bar_id = ?1 AND opened_at >= ?2 AND opened_at < ?3
            ORDER BY opened_at DESC, id
            "#,
        )
        .bind(bar_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(registers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{seed_bar, test_db};
    use crate::DbError;
    use maquis_core::RegisterStatus;
    use uuid::Uuid;

    fn open_register(bar_id: &str, cashier_id: &str, opening: i64) -> CashRegister {
        CashRegister {
            id: Uuid::new_v4().to_string(),
            bar_id: bar_id.to_string(),
            cashier_id: cashier_id.to_string(),
            opening_amount: opening,
            closing_amount: None,
            expected_amount: None,
            variance: None,
            status: RegisterStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_one_open_drawer_per_cashier() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "ABCD1234").await;
        let repo = db.registers();

        repo.insert(db.pool(), &open_register(&bar.id, "cashier-1", 5000))
            .await
            .unwrap();
        let err = repo
            .insert(db.pool(), &open_register(&bar.id, "cashier-1", 1000))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        // Another cashier is fine.
        repo.insert(db.pool(), &open_register(&bar.id, "cashier-2", 0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_close_only_once() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "ABCD1234").await;
        let repo = db.registers();
        let register = open_register(&bar.id, "cashier-1", 5000);
        repo.insert(db.pool(), &register).await.unwrap();

        let closing = RegisterClosing {
            closing_amount: 8200,
            expected_amount: 8000,
            variance: 200,
            notes: Some("fin de service"),
            closed_at: Utc::now(),
        };
        let closed = repo.close(db.pool(), &register.id, &closing).await.unwrap().unwrap();
        assert_eq!(closed.status, RegisterStatus::Closed);
        assert_eq!(closed.variance, Some(200));

        assert!(repo.close(db.pool(), &register.id, &closing).await.unwrap().is_none());

        // A new session can be opened once the previous one is closed.
        repo.insert(db.pool(), &open_register(&bar.id, "cashier-1", 3000))
            .await
            .unwrap();
        let open = repo.find_open(db.pool(), &bar.id, "cashier-1").await.unwrap().unwrap();
        assert_eq!(open.opening_amount, 3000);
    }
}
