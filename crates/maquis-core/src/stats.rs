//! # Dashboard Projections
//!
//! Read-only rollups shown on the owner and cashier dashboards.
//!
//! Both projections are pure functions of entities the engine has just read
//! from the store. Nothing here is cached between calls, so the figures a
//! dashboard shows can never drift away from the ledgers.
//!
//! ```text
//! orders (window) ──┐
//! order items ──────┼──▶ DashboardStats::compute ──▶ { totalSales, netProfit,
//! products ─────────┘                                  lowStockCount, ... }
//!
//! drawer session ───┐
//! attributed orders ┼──▶ CashRegisterSummary::compute ──▶ { totalSales,
//! session payments ─┘                                       cashSales, ... }
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{
    CashRegister, Order, OrderItem, OrderPayment, OrderStatus, PaymentMethod, Product,
};

// =============================================================================
// Time Window
// =============================================================================

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The calendar day `date` as lived in time zone `tz`.
    ///
    /// Uses the earliest instant when local midnight is ambiguous, and the
    /// UTC interpretation when it does not exist (DST gap).
    pub fn local_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Self {
        let start_of = |day: NaiveDate| -> DateTime<Utc> {
            let midnight = day.and_time(chrono::NaiveTime::MIN);
            tz.from_local_datetime(&midnight)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
        };

        let next = date.succ_opt().unwrap_or(date);
        let start = start_of(date);
        let end = if next == date {
            start + Duration::days(1)
        } else {
            start_of(next)
        };

        Self { start, end }
    }

    /// Today in the machine's local time zone.
    pub fn today() -> Self {
        Self::local_day(&Local, Local::now().date_naive())
    }

    #[inline]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

// =============================================================================
// Dashboard Stats
// =============================================================================

/// Owner dashboard figures for one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Σ total of non-cancelled orders created in the window.
    pub total_sales: i64,
    /// Σ (unit_price - unit_cost) × quantity over those orders' items.
    pub net_profit: i64,
    /// Active products at or below their threshold (not windowed).
    pub low_stock_count: i64,
    /// Σ credit_amount of non-cancelled orders in the window.
    pub credit_amount: i64,
    /// Every order created in the window, cancelled ones included.
    pub orders_today: i64,
    /// Orders in the window still waiting to be picked up.
    pub orders_pending: i64,
}

impl DashboardStats {
    /// Computes the stats for `window`.
    ///
    /// `orders` and `items` may contain rows outside the window; they are
    /// filtered here. Cancelled orders never count as sales, profit or credit.
    pub fn compute(
        window: &TimeWindow,
        orders: &[Order],
        items: &[OrderItem],
        products: &[Product],
    ) -> Self {
        let in_window: Vec<&Order> = orders
            .iter()
            .filter(|o| window.contains(o.created_at))
            .collect();

        let billable: Vec<&Order> = in_window
            .iter()
            .copied()
            .filter(|o| o.status != OrderStatus::Cancelled)
            .collect();
        let billable_ids: HashSet<&str> = billable.iter().map(|o| o.id.as_str()).collect();

        let total_sales: Money = billable.iter().map(|o| o.total()).sum();
        let credit_amount: Money = billable.iter().map(|o| Money::new(o.credit_amount)).sum();
        let net_profit: Money = items
            .iter()
            .filter(|i| billable_ids.contains(i.order_id.as_str()))
            .map(OrderItem::profit)
            .sum();

        Self {
            total_sales: total_sales.amount(),
            net_profit: net_profit.amount(),
            low_stock_count: products.iter().filter(|p| p.is_low_stock()).count() as i64,
            credit_amount: credit_amount.amount(),
            orders_today: in_window.len() as i64,
            orders_pending: in_window
                .iter()
                .filter(|o| o.status == OrderStatus::Pending)
                .count() as i64,
        }
    }
}

// =============================================================================
// Cash Register Summary
// =============================================================================

/// Cashier dashboard figures for one drawer session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CashRegisterSummary {
    /// Σ total of paid orders attributed to the session.
    pub total_sales: i64,
    pub total_orders: i64,
    pub cash_sales: i64,
    pub mobile_money_sales: i64,
    pub card_sales: i64,
    /// Stored value once closed, `opening + total_sales` while open.
    pub expected_amount: i64,
    /// `None` until the drawer is counted.
    pub variance: Option<i64>,
}

impl CashRegisterSummary {
    /// Summarizes `register` from the orders and payments recorded against it.
    ///
    /// Rows attributed to other sessions are ignored.
    pub fn compute(register: &CashRegister, orders: &[Order], payments: &[OrderPayment]) -> Self {
        let attributed = |session: &Option<String>| session.as_deref() == Some(register.id.as_str());

        let finalized: Vec<&Order> = orders
            .iter()
            .filter(|o| attributed(&o.cash_register_id) && o.status == OrderStatus::Paid)
            .collect();
        let total_sales: Money = finalized.iter().map(|o| o.total()).sum();

        let by_method = |method: PaymentMethod| -> i64 {
            payments
                .iter()
                .filter(|p| attributed(&p.cash_register_id) && p.method == method)
                .map(|p| Money::new(p.amount))
                .sum::<Money>()
                .amount()
        };

        let expected_amount = register
            .expected_amount
            .unwrap_or(register.opening_amount + total_sales.amount());

        Self {
            total_sales: total_sales.amount(),
            total_orders: finalized.len() as i64,
            cash_sales: by_method(PaymentMethod::Cash),
            mobile_money_sales: by_method(PaymentMethod::MobileMoney),
            card_sales: by_method(PaymentMethod::Card),
            expected_amount,
            variance: register.variance,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
