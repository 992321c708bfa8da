//! # Cash Drawer Sessions
//!
//! A cashier opens a drawer with a counted float, takes payments under it,
//! and closes it by counting again. The close writes the expected amount and
//! the variance once; a closed session never changes.
//!
//! At most one open session per cashier and bar, enforced by the partial
//! unique index on `cash_registers (bar_id, cashier_id) WHERE status = 'open'`.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use maquis_core::register::ensure_open;
use maquis_core::validation::{validate_amount, validate_optional_text};
use maquis_core::{
    CashRegister, CoreError, Operation, OrderStatus, Reconciliation, RegisterStatus, TimeWindow,
    VarianceOutcome,
};
use maquis_db::{DbError, RegisterClosing};

use crate::access;
use crate::error::{EngineError, EngineResult};
use crate::Engine;

pub struct RegisterService<'a> {
    engine: &'a Engine,
}

impl<'a> RegisterService<'a> {
    pub(crate) fn new(engine: &'a Engine) -> Self {
        RegisterService { engine }
    }

    /// Opens a drawer session for the actor.
    ///
    /// ## Errors
    /// `CONFLICT` when the actor already has a drawer open in this bar.
    pub async fn open(
        &self,
        bar_id: &str,
        actor_id: &str,
        opening_amount: i64,
        notes: Option<&str>,
    ) -> EngineResult<CashRegister> {
        self.engine
            .retry
            .run("open_register", move || {
                self.open_once(bar_id, actor_id, opening_amount, notes)
            })
            .await
    }

    async fn open_once(
        &self,
        bar_id: &str,
        actor_id: &str,
        opening_amount: i64,
        notes: Option<&str>,
    ) -> EngineResult<CashRegister> {
        access::authorize(&self.engine.db, bar_id, actor_id, Operation::OpenRegister).await?;
        validate_amount("opening_amount", opening_amount)?;

        let register = CashRegister {
            id: Uuid::new_v4().to_string(),
            bar_id: bar_id.to_string(),
            cashier_id: actor_id.to_string(),
            opening_amount,
            closing_amount: None,
            expected_amount: None,
            variance: None,
            status: RegisterStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
            notes: validate_optional_text("notes", notes)?,
        };

        let db = &self.engine.db;
        db.registers().insert(db.pool(), &register).await?;

        info!(
            register_id = %register.id,
            bar_id = %bar_id,
            cashier_id = %actor_id,
            opening = %self.engine.config.currency.format(opening_amount),
            "Cash register opened"
        );
        Ok(register)
    }

    /// Counts and closes a drawer session.
    ///
    /// `expected = opening + Σ total of the paid orders attributed to the
    /// session`, `variance = closing - expected`.
    pub async fn close(
        &self,
        register_id: &str,
        actor_id: &str,
        closing_amount: i64,
        notes: Option<&str>,
    ) -> EngineResult<CashRegister> {
        self.engine
            .retry
            .run("close_register", move || {
                self.close_once(register_id, actor_id, closing_amount, notes)
            })
            .await
    }

    async fn close_once(
        &self,
        register_id: &str,
        actor_id: &str,
        closing_amount: i64,
        notes: Option<&str>,
    ) -> EngineResult<CashRegister> {
        let register = self.find(register_id).await?;
        let ctx = access::authorize(
            &self.engine.db,
            &register.bar_id,
            actor_id,
            Operation::CloseRegister,
        )
        .await?;
        if register.cashier_id != actor_id && !ctx.is_owner() {
            return Err(EngineError::forbidden(
                "Only the cashier who opened this drawer or the owner can close it",
            ));
        }
        ensure_open(&register)?;
        let notes = validate_optional_text("notes", notes)?;

        let db = &self.engine.db;
        let mut tx = db.begin().await?;

        let finalized: Vec<i64> = db
            .orders()
            .list_for_register(&mut *tx, register_id)
            .await?
            .into_iter()
            .filter(|o| o.status == OrderStatus::Paid)
            .map(|o| o.total)
            .collect();
        let order_count = finalized.len();
        let reconciliation =
            Reconciliation::compute(register.opening_amount, finalized, closing_amount)?;

        let closing = RegisterClosing {
            closing_amount,
            expected_amount: reconciliation.expected_amount.amount(),
            variance: reconciliation.variance.amount(),
            notes: notes.as_deref(),
            closed_at: Utc::now(),
        };
        let closed = db
            .registers()
            .close(&mut *tx, register_id, &closing)
            .await?
            .ok_or_else(|| CoreError::RegisterClosed(register_id.to_string()))?;
        tx.commit().await.map_err(DbError::from)?;

        let currency = &self.engine.config.currency;
        let expected = currency.format(closing.expected_amount);
        let counted = currency.format(closing_amount);
        let variance = currency.format(closing.variance);
        match reconciliation.outcome() {
            VarianceOutcome::Shortage => warn!(
                register_id = %register_id,
                cashier_id = %register.cashier_id,
                orders = order_count,
                %expected,
                %counted,
                %variance,
                "Cash register closed short"
            ),
            _ => info!(
                register_id = %register_id,
                cashier_id = %register.cashier_id,
                orders = order_count,
                %expected,
                %counted,
                %variance,
                "Cash register closed"
            ),
        }
        Ok(closed)
    }

    /// The actor's open drawer in a bar, if any.
    pub async fn current(&self, bar_id: &str, actor_id: &str) -> EngineResult<Option<CashRegister>> {
        access::authorize(&self.engine.db, bar_id, actor_id, Operation::OpenRegister).await?;
        let db = &self.engine.db;
        Ok(db.registers().find_open(db.pool(), bar_id, actor_id).await?)
    }

    pub async fn get(&self, register_id: &str, actor_id: &str) -> EngineResult<CashRegister> {
        let register = self.find(register_id).await?;
        access::authorize(&self.engine.db, &register.bar_id, actor_id, Operation::ViewDashboard)
            .await?;
        Ok(register)
    }

    /// Sessions opened during `window`, today when `None`.
    pub async fn list(
        &self,
        bar_id: &str,
        actor_id: &str,
        window: Option<TimeWindow>,
    ) -> EngineResult<Vec<CashRegister>> {
        access::authorize(&self.engine.db, bar_id, actor_id, Operation::ViewDashboard).await?;
        let window = window.unwrap_or_else(TimeWindow::today);
        Ok(self
            .engine
            .db
            .registers()
            .list_for_bar(bar_id, window.start, window.end)
            .await?)
    }

    async fn find(&self, register_id: &str) -> EngineResult<CashRegister> {
        let db = &self.engine.db;
        db.registers()
            .find_by_id(db.pool(), register_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Cash register", register_id))
    }
}
