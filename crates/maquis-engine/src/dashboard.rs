//! Dashboard rollups, computed from the ledgers on every call.

use tracing::debug;

use maquis_core::{CashRegisterSummary, DashboardStats, Operation, TimeWindow};
use maquis_db::OrderFilter;

use crate::access;
use crate::error::{EngineError, EngineResult};
use crate::Engine;

pub struct DashboardService<'a> {
    engine: &'a Engine,
}

impl<'a> DashboardService<'a> {
    pub(crate) fn new(engine: &'a Engine) -> Self {
        DashboardService { engine }
    }

    /// Owner dashboard for `window`, today when `None`.
    pub async fn stats(
        &self,
        bar_id: &str,
        actor_id: &str,
        window: Option<TimeWindow>,
    ) -> EngineResult<DashboardStats> {
        access::authorize(&self.engine.db, bar_id, actor_id, Operation::ViewDashboard).await?;
        let window = window.unwrap_or_else(TimeWindow::today);
        let db = &self.engine.db;

        let filter = OrderFilter::default().created_between(window.start, window.end);
        let orders = db.orders().list(bar_id, &filter).await?;
        let items = db
            .orders()
            .items_created_between(bar_id, window.start, window.end)
            .await?;
        let products = db.products().list_for_bar(bar_id, false).await?;

        let stats = DashboardStats::compute(&window, &orders, &items, &products);
        debug!(bar_id = %bar_id, orders = orders.len(), ?stats, "Dashboard computed");
        Ok(stats)
    }

    /// Cashier view of one drawer session.
    pub async fn register_summary(
        &self,
        register_id: &str,
        actor_id: &str,
    ) -> EngineResult<CashRegisterSummary> {
        let db = &self.engine.db;
        let register = db
            .registers()
            .find_by_id(db.pool(), register_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Cash register", register_id))?;
        access::authorize(db, &register.bar_id, actor_id, Operation::ViewDashboard).await?;

        let orders = db.orders().list_for_register(db.pool(), register_id).await?;
        let payments = db.orders().payments_for_register(register_id).await?;

        Ok(CashRegisterSummary::compute(&register, &orders, &payments))
    }
}
