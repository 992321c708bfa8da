//! # Order Lifecycle
//!
//! ## Transition Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  advance(order, actor)                                                 │
//! │                                                                         │
//! │  1. Read order, resolve actor role            (pool)                   │
//! │  2. Pick successor, check role                (pure)                   │
//! │  3. BEGIN                                                              │
//! │       UPDATE orders ... WHERE status = <read status>  ── none? CONFLICT│
//! │       → paid: attribute to actor's drawer if still open                │
//! │       → served: one OUT movement per line            ── short? STOCK   │
//! │     COMMIT                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guarded status write comes first in the transaction, so a duplicate
//! or racing call loses before it can touch stock.

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use maquis_core::access::can_advance;
use maquis_core::order::{
    advance_target, ensure_acceptable, ensure_assignable, ensure_cancellable, normalize_lines,
};
use maquis_core::validation::validate_optional_text;
use maquis_core::{
    MovementType, Operation, Order, OrderItem, OrderLine, OrderPayment, OrderStatus,
    OrderTotals, PaymentMethod, PaymentState, PaymentStatus, PricedLine, Role,
};
use maquis_db::{DbError, OrderFilter, PaymentUpdate};

use crate::access;
use crate::error::{EngineError, EngineResult};
use crate::inventory::{apply_movement, MovementRequest};
use crate::Engine;

/// Input for [`OrderService::create`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewOrder {
    pub items: Vec<OrderLine>,
    pub table_number: Option<String>,
    pub customer_name: Option<String>,
    #[serde(default)]
    pub discount: i64,
    pub notes: Option<String>,
}

impl NewOrder {
    pub fn new(items: Vec<OrderLine>) -> Self {
        NewOrder {
            items,
            ..Default::default()
        }
    }

    pub fn table(mut self, table_number: impl Into<String>) -> Self {
        self.table_number = Some(table_number.into());
        self
    }

    pub fn discount(mut self, discount: i64) -> Self {
        self.discount = discount;
        self
    }
}

pub struct OrderService<'a> {
    engine: &'a Engine,
}

impl<'a> OrderService<'a> {
    pub(crate) fn new(engine: &'a Engine) -> Self {
        OrderService { engine }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates a pending order with prices frozen from the current menu.
    ///
    /// A waiter creating an order becomes its assignee.
    pub async fn create(&self, bar_id: &str, actor_id: &str, input: NewOrder) -> EngineResult<Order> {
        let input = &input;
        self.engine
            .retry
            .run("create_order", move || self.create_once(bar_id, actor_id, input))
            .await
    }

    async fn create_once(&self, bar_id: &str, actor_id: &str, input: &NewOrder) -> EngineResult<Order> {
        let ctx = access::authorize(&self.engine.db, bar_id, actor_id, Operation::CreateOrder).await?;

        let limits = &self.engine.config.orders;
        let lines = normalize_lines(&input.items, limits.max_items, limits.max_item_quantity)?;
        let table_number = validate_optional_text("table_number", input.table_number.as_deref())?;
        let customer_name = validate_optional_text("customer_name", input.customer_name.as_deref())?;
        let notes = validate_optional_text("notes", input.notes.as_deref())?;

        let db = &self.engine.db;
        let mut tx = db.begin().await?;

        let mut priced = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = db
                .products()
                .find_by_id(&mut *tx, &line.product_id)
                .await?
                .ok_or_else(|| EngineError::not_found("Product", &line.product_id))?;
            priced.push(PricedLine::from_product(bar_id, &product, line.quantity)?);
        }
        let totals = OrderTotals::compute(&priced, input.discount)?;

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4().to_string(),
            bar_id: bar_id.to_string(),
            cash_register_id: None,
            created_by: actor_id.to_string(),
            assigned_to: (ctx.role == Role::Waiter).then(|| actor_id.to_string()),
            table_number,
            customer_name,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_method: None,
            subtotal: totals.subtotal.amount(),
            discount: totals.discount.amount(),
            total: totals.total.amount(),
            paid_amount: 0,
            credit_amount: 0,
            notes,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        db.orders().insert(&mut *tx, &order).await?;

        for line in &priced {
            let item = OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                unit_cost: line.unit_cost,
                subtotal: line.subtotal()?.amount(),
                created_at: now,
            };
            db.orders().insert_item(&mut *tx, &item).await?;
        }
        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id = %order.id,
            bar_id = %bar_id,
            lines = priced.len(),
            total = order.total,
            "Order created"
        );
        Ok(order)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Moves the order to its unique successor.
    pub async fn advance(&self, order_id: &str, actor_id: &str) -> EngineResult<Order> {
        self.engine
            .retry
            .run("advance_order", move || self.advance_once(order_id, None, actor_id))
            .await
    }

    /// Like [`advance`](Self::advance), but only from the status the caller
    /// last saw.
    ///
    /// A repeated call finds the order already moved and fails with
    /// `CONFLICT` without applying anything.
    pub async fn advance_from(
        &self,
        order_id: &str,
        expected: OrderStatus,
        actor_id: &str,
    ) -> EngineResult<Order> {
        self.engine
            .retry
            .run("advance_order", move || {
                self.advance_once(order_id, Some(expected), actor_id)
            })
            .await
    }

    async fn advance_once(
        &self,
        order_id: &str,
        expected: Option<OrderStatus>,
        actor_id: &str,
    ) -> EngineResult<Order> {
        let order = self.find(order_id).await?;
        let ctx = access::resolve(&self.engine.db, &order.bar_id, actor_id).await?;

        if let Some(expected) = expected {
            if order.status != expected {
                return Err(EngineError::conflict(format!(
                    "Order {} is already {}, not {}",
                    order_id, order.status, expected
                )));
            }
        }

        let target = advance_target(order_id, order.status)?;
        if !can_advance(ctx.role, actor_id, order.assigned_to.as_deref()) {
            return Err(EngineError::invalid_transition(format!(
                "Only the assigned waiter, a cashier or the owner can move order {} to {}",
                order_id, target
            )));
        }

        let db = &self.engine.db;
        let now = Utc::now();

        let mut tx = db.begin().await?;
        let updated = if target == OrderStatus::Paid {
            db.orders().settle(&mut *tx, order_id, actor_id, now).await?
        } else {
            db.orders()
                .transition(&mut *tx, order_id, order.status, target, now)
                .await?
        }
        .ok_or_else(|| EngineError::order_changed(order_id))?;

        if target == OrderStatus::Served {
            let items = db.orders().items(&mut *tx, order_id).await?;
            for item in &items {
                let request = MovementRequest {
                    bar_id: &order.bar_id,
                    product_id: &item.product_id,
                    movement_type: MovementType::Out,
                    quantity: item.quantity,
                    reason: Some("Commande servie"),
                    reference_id: Some(order_id),
                    actor_id: Some(actor_id),
                };
                apply_movement(db, &mut tx, &request, now).await?;
            }
        }
        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id = %order_id,
            from = order.status.as_str(),
            to = target.as_str(),
            cash_register_id = ?updated.cash_register_id,
            "Order advanced"
        );
        Ok(updated)
    }

    /// Cancels an order that has not been served. Stock is untouched.
    pub async fn cancel(&self, order_id: &str, actor_id: &str) -> EngineResult<Order> {
        self.engine
            .retry
            .run("cancel_order", move || self.cancel_once(order_id, actor_id))
            .await
    }

    async fn cancel_once(&self, order_id: &str, actor_id: &str) -> EngineResult<Order> {
        let order = self.find(order_id).await?;
        access::authorize(&self.engine.db, &order.bar_id, actor_id, Operation::CancelOrder).await?;
        ensure_cancellable(order_id, order.status)?;

        let db = &self.engine.db;
        let updated = db
            .orders()
            .transition(db.pool(), order_id, order.status, OrderStatus::Cancelled, Utc::now())
            .await?
            .ok_or_else(|| EngineError::order_changed(order_id))?;

        info!(order_id = %order_id, from = order.status.as_str(), "Order cancelled");
        Ok(updated)
    }

    /// A waiter takes a pending order and starts preparing it.
    pub async fn accept(&self, order_id: &str, actor_id: &str) -> EngineResult<Order> {
        self.engine
            .retry
            .run("accept_order", move || self.accept_once(order_id, actor_id))
            .await
    }

    async fn accept_once(&self, order_id: &str, actor_id: &str) -> EngineResult<Order> {
        let order = self.find(order_id).await?;
        access::authorize(&self.engine.db, &order.bar_id, actor_id, Operation::AcceptOrder).await?;
        ensure_acceptable(&order, actor_id)?;

        let db = &self.engine.db;
        let updated = db
            .orders()
            .claim(db.pool(), order_id, actor_id, Utc::now())
            .await?
            .ok_or_else(|| EngineError::order_changed(order_id))?;

        info!(order_id = %order_id, waiter_id = %actor_id, "Order accepted");
        Ok(updated)
    }

    /// Hands an open order to one of the bar's active waiters.
    pub async fn assign(&self, order_id: &str, waiter_id: &str, actor_id: &str) -> EngineResult<Order> {
        self.engine
            .retry
            .run("assign_order", move || self.assign_once(order_id, waiter_id, actor_id))
            .await
    }

    async fn assign_once(&self, order_id: &str, waiter_id: &str, actor_id: &str) -> EngineResult<Order> {
        let order = self.find(order_id).await?;
        access::authorize(&self.engine.db, &order.bar_id, actor_id, Operation::AssignOrder).await?;
        ensure_assignable(&order)?;

        let db = &self.engine.db;
        let is_waiter = db
            .members()
            .find(db.pool(), &order.bar_id, waiter_id)
            .await?
            .is_some_and(|m| m.is_active && m.role == Role::Waiter);
        if !is_waiter {
            return Err(EngineError::validation(format!(
                "{} is not an active waiter of this bar",
                waiter_id
            )));
        }

        let updated = db
            .orders()
            .assign(db.pool(), order_id, waiter_id, Utc::now())
            .await?
            .ok_or_else(|| EngineError::order_changed(order_id))?;

        info!(order_id = %order_id, waiter_id = %waiter_id, "Order assigned");
        Ok(updated)
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Records money collected against a served order.
    ///
    /// ## Attribution
    /// The payment row is attributed to the drawer the actor has open in this
    /// bar. Without an open drawer it is still recorded, unattributed. The
    /// order itself only joins a drawer when it is finalized.
    pub async fn record_payment(
        &self,
        order_id: &str,
        amount: i64,
        method: PaymentMethod,
        actor_id: &str,
    ) -> EngineResult<Order> {
        self.engine
            .retry
            .run("record_payment", move || {
                self.record_payment_once(order_id, amount, method, actor_id)
            })
            .await
    }

    async fn record_payment_once(
        &self,
        order_id: &str,
        amount: i64,
        method: PaymentMethod,
        actor_id: &str,
    ) -> EngineResult<Order> {
        let order = self.find(order_id).await?;
        access::authorize(&self.engine.db, &order.bar_id, actor_id, Operation::RecordPayment)
            .await?;
        let state = PaymentState::apply(&order, amount)?;

        let db = &self.engine.db;
        let now = Utc::now();
        let update = PaymentUpdate {
            paid_amount: state.paid_amount,
            credit_amount: state.credit_amount,
            payment_status: state.payment_status,
            method,
            expected_version: order.version,
            now,
        };

        let mut tx = db.begin().await?;
        let updated = db
            .orders()
            .apply_payment(&mut *tx, order_id, &update)
            .await?
            .ok_or_else(|| EngineError::order_changed(order_id))?;
        let session_id = db
            .registers()
            .find_open(&mut *tx, &order.bar_id, actor_id)
            .await?
            .map(|s| s.id);
        let payment = OrderPayment {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            cash_register_id: session_id.clone(),
            method,
            amount,
            recorded_by: actor_id.to_string(),
            created_at: now,
        };
        db.orders().insert_payment(&mut *tx, &payment).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id = %order_id,
            amount,
            method = method.as_str(),
            paid = updated.paid_amount,
            credit = updated.credit_amount,
            cash_register_id = ?session_id,
            "Payment recorded"
        );
        Ok(updated)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_order(&self, order_id: &str, actor_id: &str) -> EngineResult<Order> {
        let order = self.find(order_id).await?;
        access::authorize(&self.engine.db, &order.bar_id, actor_id, Operation::ViewOrders).await?;
        Ok(order)
    }

    pub async fn get_items(&self, order_id: &str, actor_id: &str) -> EngineResult<Vec<OrderItem>> {
        let order = self.get_order(order_id, actor_id).await?;
        let db = &self.engine.db;
        Ok(db.orders().items(db.pool(), &order.id).await?)
    }

    pub async fn get_payments(&self, order_id: &str, actor_id: &str) -> EngineResult<Vec<OrderPayment>> {
        let order = self.get_order(order_id, actor_id).await?;
        let db = &self.engine.db;
        Ok(db.orders().payments(db.pool(), &order.id).await?)
    }

    pub async fn list_orders(
        &self,
        bar_id: &str,
        actor_id: &str,
        filter: &OrderFilter,
    ) -> EngineResult<Vec<Order>> {
        access::authorize(&self.engine.db, bar_id, actor_id, Operation::ViewOrders).await?;
        Ok(self.engine.db.orders().list(bar_id, filter).await?)
    }

    async fn find(&self, order_id: &str) -> EngineResult<Order> {
        let db = &self.engine.db;
        db.orders()
            .find_by_id(db.pool(), order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", order_id))
    }
}
