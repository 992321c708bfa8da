//! # Order Repository
//!
//! Orders, their frozen line items and their payments.
//!
//! ## Guarded Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every lifecycle write names the state it expects:                     │
//! │                                                                         │
//! │    UPDATE orders SET status = 'served', version = version + 1, ...     │
//! │    WHERE id = :id AND status = 'ready'                                 │
//! │    RETURNING *                                                         │
//! │                                                                         │
//! │  No row back means someone else moved the order first. The caller      │
//! │  turns that into a conflict and rolls back, so side effects written    │
//! │  in the same transaction (inventory OUT movements) never double up.    │
//! │                                                                         │
//! │  Payments guard on `version` instead, so two cashiers recording a      │
//! │  payment on the same stale view cannot both land.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use maquis_core::{Order, OrderItem, OrderPayment, OrderStatus, PaymentMethod, PaymentStatus};

/// Criteria for listing a bar's orders. Unset fields don't filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub assigned_to: Option<String>,
    pub created_by: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub created_to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl OrderFilter {
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn assigned_to(mut self, user_id: impl Into<String>) -> Self {
        self.assigned_to = Some(user_id.into());
        self
    }

    pub fn created_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self.created_to = Some(to);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Payment fields written by [`OrderRepository::apply_payment`].
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub paid_amount: i64,
    pub credit_amount: i64,
    pub payment_status: PaymentStatus,
    pub method: PaymentMethod,
    /// Version the caller read; the write only lands if it still matches.
    pub expected_version: i64,
    pub now: DateTime<Utc>,
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub async fn insert<'e, E>(&self, executor: E, order: &Order) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %order.id, bar_id = %order.bar_id, total = order.total, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, bar_id, cash_register_id, created_by, assigned_to,
                table_number, customer_name, status, payment_status, payment_method,
                subtotal, discount, total, paid_amount, credit_amount,
                notes, version, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.bar_id)
        .bind(&order.cash_register_id)
        .bind(&order.created_by)
        .bind(&order.assigned_to)
        .bind(&order.table_number)
        .bind(&order.customer_name)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.payment_method)
        .bind(order.subtotal)
        .bind(order.discount)
        .bind(order.total)
        .bind(order.paid_amount)
        .bind(order.credit_amount)
        .bind(&order.notes)
        .bind(order.version)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn insert_item<'e, E>(&self, executor: E, item: &OrderItem) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(order_id = %item.order_id, product_id = %item.product_id, quantity = item.quantity, "Inserting order item");

        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, product_name,
                quantity, unit_price, unit_cost, subtotal, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.unit_cost)
        .bind(item.subtotal)
        .bind(item.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Moves an order from `from` to `to` if it is still in `from`.
    ///
    /// Returns `None` when the order is no longer in `from`.
    pub async fn transition<'e, E>(
        &self,
        executor: E,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> DbResult<Option<Order>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, from = from.as_str(), to = to.as_str(), "Transitioning order");

        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = ?1, version = version + 1, updated_at = ?2
            WHERE id = ?3 AND status = ?4
            RETURNING *
            "#,
        )
        .bind(to)
        .bind(now)
        .bind(id)
        .bind(from)
        .fetch_optional(executor)
        .await?;

        Ok(order)
    }

    /// Finalizes a served order and attributes it to the drawer `cashier_id`
    /// has open in the order's bar at the moment of the write.
    ///
    /// The drawer lookup runs inside the same statement, so a drawer closed
    /// concurrently is never picked. With no open drawer the order is left
    /// unattributed.
    ///
    /// Returns `None` when the order is no longer served.
    pub async fn settle<'e, E>(
        &self,
        executor: E,
        id: &str,
        cashier_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<Order>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, cashier_id = %cashier_id, "Settling order");

        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = 'paid',
                cash_register_id = (
                    SELECT r.id FROM cash_registers r
                    WHERE r.bar_id = orders.bar_id
                      AND r.cashier_id = ?1
                      AND r.status = 'open'
                ),
                version = version + 1,
                updated_at = ?2
            WHERE id = ?3 AND status = 'served'
            RETURNING *
            "#,
        )
        .bind(cashier_id)
        .bind(now)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(order)
    }

    /// A waiter claims a pending order: assigns it and starts preparation.
    ///
    /// Only lands while the order is pending and unassigned or already
    /// assigned to the same waiter.
    pub async fn claim<'e, E>(
        &self,
        executor: E,
        id: &str,
        waiter_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<Order>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, waiter_id = %waiter_id, "Claiming order");

        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = 'preparing', assigned_to = ?1, version = version + 1, updated_at = ?2
            WHERE id = ?3
              AND status = 'pending'
              AND (assigned_to IS NULL OR assigned_to = ?1)
            RETURNING *
            "#,
        )
        .bind(waiter_id)
        .bind(now)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(order)
    }

    /// Sets the assignee of a non-terminal order.
    pub async fn assign<'e, E>(
        &self,
        executor: E,
        id: &str,
        waiter_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<Order>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, waiter_id = %waiter_id, "Assigning order");

        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET assigned_to = ?1, version = version + 1, updated_at = ?2
            WHERE id = ?3 AND status NOT IN ('paid', 'cancelled')
            RETURNING *
            "#,
        )
        .bind(waiter_id)
        .bind(now)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(order)
    }

    /// Writes new payment totals onto a served order.
    ///
    /// Returns `None` when the order changed since it was read (version
    /// mismatch) or is no longer served.
    pub async fn apply_payment<'e, E>(
        &self,
        executor: E,
        id: &str,
        update: &PaymentUpdate,
    ) -> DbResult<Option<Order>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, paid_amount = update.paid_amount, "Applying payment");

        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET paid_amount = ?1,
                credit_amount = ?2,
                payment_status = ?3,
                payment_method = ?4,
                version = version + 1,
                updated_at = ?5
            WHERE id = ?6 AND version = ?7 AND status = 'served'
            RETURNING *
            "#,
        )
        .bind(update.paid_amount)
        .bind(update.credit_amount)
        .bind(update.payment_status)
        .bind(update.method)
        .bind(update.now)
        .bind(id)
        .bind(update.expected_version)
        .fetch_optional(executor)
        .await?;

        Ok(order)
    }

    pub async fn insert_payment<'e, E>(&self, executor: E, payment: &OrderPayment) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(order_id = %payment.order_id, amount = payment.amount, method = payment.method.as_str(), "Inserting payment");

        sqlx::query(
            r#"
            INSERT INTO order_payments (
                id, order_id, cash_register_id, method, amount, recorded_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(&payment.cash_register_id)
        .bind(payment.method)
        .bind(payment.amount)
        .bind(&payment.recorded_by)
        .bind(payment.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn find_by_id<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<Order>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, "Getting order by ID");

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(order)
    }

    pub async fn items<'e, E>(&self, executor: E, order_id: &str) -> DbResult<Vec<OrderItem>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = ?1 ORDER BY created_at, id",
        )
        .bind(order_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    pub async fn payments<'e, E>(&self, executor: E, order_id: &str) -> DbResult<Vec<OrderPayment>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let payments = sqlx::query_as::<_, OrderPayment>(
            "SELECT * FROM order_payments WHERE order_id = ?1 ORDER BY created_at, id",
        )
        .bind(order_id)
        .fetch_all(executor)
        .await?;

        Ok(payments)
    }

    /// Orders of a bar matching `filter`, newest first.
    pub async fn list(&self, bar_id: &str, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        debug!(bar_id = %bar_id, ?filter, "Listing orders");

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM orders WHERE bar_id = ");
        query.push_bind(bar_id);

        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(assignee) = &filter.assigned_to {
            query.push(" AND assigned_to = ").push_bind(assignee);
        }
        if let Some(creator) = &filter.created_by {
            query.push(" AND created_by = ").push_bind(creator);
        }
        if let Some(from) = filter.created_from {
            query.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.created_to {
            query.push(" AND created_at < ").push_bind(to);
        }

        query.push(" ORDER BY created_at DESC, id");

        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let orders = query.build_query_as::<Order>().fetch_all(&self.pool).await?;
        Ok(orders)
    }

    /// Items of every order a bar created in `[from, to)`.
    pub async fn items_created_between(
        &self,
        bar_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT oi.*
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE o.bar_id = ?1 AND o.created_at >= ?2 AND o.created_at < ?3
            ORDER BY oi.created_at, oi.id
            "#,
        )
        .bind(bar_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Orders attributed to a drawer session, whatever their status.
    pub async fn list_for_register<'e, E>(
        &self,
        executor: E,
        register_id: &str,
    ) -> DbResult<Vec<Order>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE cash_register_id = ?1 ORDER BY created_at, id",
        )
        .bind(register_id)
        .fetch_all(executor)
        .await?;

        Ok(orders)
    }

    /// Payments taken under a drawer session.
    pub async fn payments_for_register(&self, register_id: &str) -> DbResult<Vec<OrderPayment>> {
        let payments = sqlx::query_as::<_, OrderPayment>(
            "SELECT * FROM order_payments WHERE cash_register_id = ?1 ORDER BY created_at, id",
        )
        .bind(register_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{product, seed_bar, test_db};
    use crate::{Database, RegisterClosing};
    use maquis_core::{Bar, CashRegister, RegisterStatus};
    use uuid::Uuid;

    async fn seed_order(db: &Database, bar: &Bar, status: OrderStatus) -> Order {
        let castel = product(&bar.id, "Castel", 1000, 20);
        db.products().insert(db.pool(), &castel).await.unwrap();

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4().to_string(),
            bar_id: bar.id.clone(),
            cash_register_id: None,
            created_by: "waiter-1".to_string(),
            assigned_to: None,
            table_number: Some("7".to_string()),
            customer_name: None,
            status,
            payment_status: PaymentStatus::Unpaid,
            payment_method: None,
            subtotal: 2000,
            discount: 0,
            total: 2000,
            paid_amount: 0,
            credit_amount: 0,
            notes: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let item = OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            product_id: castel.id.clone(),
            product_name: castel.name.clone(),
            quantity: 2,
            unit_price: 1000,
            unit_cost: 500,
            subtotal: 2000,
            created_at: now,
        };

        let mut tx = db.begin().await.unwrap();
        db.orders().insert(&mut *tx, &order).await.unwrap();
        db.orders().insert_item(&mut *tx, &item).await.unwrap();
        tx.commit().await.unwrap();
        order
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "ABCD1234").await;
        let order = seed_order(&db, &bar, OrderStatus::Pending).await;

        let stored = db.orders().find_by_id(db.pool(), &order.id).await.unwrap().unwrap();
        assert_eq!(stored.total, 2000);
        assert_eq!(stored.status, OrderStatus::Pending);

        let items = db.orders().items(db.pool(), &order.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].subtotal, 2000);
    }

    #[tokio::test]
    async fn test_transition_is_guarded_by_status() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "ABCD1234").await;
        let order = seed_order(&db, &bar, OrderStatus::Pending).await;
        let repo = db.orders();

        let moved = repo
            .transition(db.pool(), &order.id, OrderStatus::Pending, OrderStatus::Preparing, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.status, OrderStatus::Preparing);
        assert_eq!(moved.version, 2);

        // Replaying the same move finds nothing to update.
        let replay = repo
            .transition(db.pool(), &order.id, OrderStatus::Pending, OrderStatus::Preparing, Utc::now())
            .await
            .unwrap();
        assert!(replay.is_none());
    }

    #[tokio::test]
    async fn test_settle_attributes_to_the_open_drawer_only() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "ABCD1234").await;
        let now = Utc::now();
        let drawer = CashRegister {
            id: Uuid::new_v4().to_string(),
            bar_id: bar.id.clone(),
            cashier_id: "cashier-1".to_string(),
            opening_amount: 0,
            closing_amount: None,
            expected_amount: None,
            variance: None,
            status: RegisterStatus::Open,
            opened_at: now,
            closed_at: None,
            notes: None,
        };
        db.registers().insert(db.pool(), &drawer).await.unwrap();

        let order = seed_order(&db, &bar, OrderStatus::Served).await;
        let settled = db
            .orders()
            .settle(db.pool(), &order.id, "cashier-1", now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(settled.status, OrderStatus::Paid);
        assert_eq!(settled.cash_register_id.as_deref(), Some(drawer.id.as_str()));

        // Settling twice finds nothing served.
        assert!(db
            .orders()
            .settle(db.pool(), &order.id, "cashier-1", now)
            .await
            .unwrap()
            .is_none());

        let closing = RegisterClosing {
            closing_amount: 0,
            expected_amount: 0,
            variance: 0,
            notes: None,
            closed_at: now,
        };
        db.registers().close(db.pool(), &drawer.id, &closing).await.unwrap().unwrap();

        let late = seed_order(&db, &bar, OrderStatus::Served).await;
        let unattributed = db
            .orders()
            .settle(db.pool(), &late.id, "cashier-1", now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unattributed.status, OrderStatus::Paid);
        assert!(unattributed.cash_register_id.is_none());
    }

    #[tokio::test]
    async fn test_claim_rules() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "ABCD1234").await;
        let order = seed_order(&db, &bar, OrderStatus::Pending).await;
        let repo = db.orders();

        let claimed = repo
            .claim(db.pool(), &order.id, "waiter-2", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.status, OrderStatus::Preparing);
        assert_eq!(claimed.assigned_to.as_deref(), Some("waiter-2"));

        assert!(repo
            .claim(db.pool(), &order.id, "waiter-3", Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_payment_guarded_by_version() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "ABCD1234").await;
        let order = seed_order(&db, &bar, OrderStatus::Served).await;

        let update = PaymentUpdate {
            paid_amount: 500,
            credit_amount: 1500,
            payment_status: PaymentStatus::Partial,
            method: PaymentMethod::Cash,
            expected_version: order.version,
            now: Utc::now(),
        };
        let paid = db
            .orders()
            .apply_payment(db.pool(), &order.id, &update)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid.credit_amount, 1500);
        assert_eq!(paid.payment_method, Some(PaymentMethod::Cash));

        // Same stale version again: rejected.
        assert!(db
            .orders()
            .apply_payment(db.pool(), &order.id, &update)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = test_db().await;
        let bar = seed_bar(&db, "owner-1", "Chez Tantie", "ABCD1234").await;
        seed_order(&db, &bar, OrderStatus::Pending).await;
        seed_order(&db, &bar, OrderStatus::Served).await;

        let all = db.orders().list(&bar.id, &OrderFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let pending = db
            .orders()
            .list(&bar.id, &OrderFilter::default().with_status(OrderStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        let tomorrow = Utc::now() + chrono::Duration::days(1);
        let none = db
            .orders()
            .list(
                &bar.id,
                &OrderFilter::default().created_between(tomorrow, tomorrow + chrono::Duration::days(1)),
            )
            .await
            .unwrap();
        assert!(none.is_empty());

        let limited = db
            .orders()
            .list(&bar.id, &OrderFilter::default().limit(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }
}
