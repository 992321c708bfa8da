//! # Domain Types
//!
//! Core domain types used throughout the MaquisPro engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Bar        │──▶│   Membership    │   │    Product      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  bar_id (FK)    │   │  bar_id (FK)    │       │
//! │  │  owner_id       │   │  user_id        │   │  sale_price     │       │
//! │  │  invitation_code│   │  role           │   │  stock_quantity │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │──▶│   OrderItem     │   │  CashRegister   │       │
//! │  │  ─────────────  │   │  (frozen price) │   │  ─────────────  │       │
//! │  │  status         │   └─────────────────┘   │  cashier_id     │       │
//! │  │  payment_status │──▶┌─────────────────┐   │  opening/closing│       │
//! │  │  cash_register? │   │  OrderPayment   │   │  variance       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  InventoryMovement: append-only ledger of signed stock deltas           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every row below a `Bar` carries its `bar_id`. Amounts are integers in the
//! smallest currency unit (see [`crate::money`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Role
// =============================================================================

/// Role of a user inside one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Created the bar. Exactly one per bar.
    Owner,
    /// Runs a cash drawer.
    Cashier,
    /// Takes and serves orders.
    Waiter,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Cashier => "cashier",
            Role::Waiter => "waiter",
        }
    }
}

/// Employees who join through an invitation code start as waiters.
impl Default for Role {
    fn default() -> Self {
        Role::Waiter
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Bar (tenant)
// =============================================================================

/// A bar or restaurant. The tenant boundary for every other record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Bar {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    /// Globally unique join code, 8 characters from `A-Z0-9`.
    pub invitation_code: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A user's role in a bar. Deactivated, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Membership {
    pub id: String,
    pub bar_id: String,
    pub user_id: String,
    pub role: Role,
    pub is_active: bool,
    #[ts(as = "String")]
    pub joined_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A product on a bar's menu, with its stock level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub bar_id: String,
    pub name: String,
    pub description: Option<String>,

    /// Price charged to the customer.
    pub sale_price: i64,

    /// Purchase cost, for profit figures.
    pub cost_price: i64,

    /// Never negative after a committed movement.
    pub stock_quantity: i64,

    /// Advisory only; never blocks a movement.
    pub low_stock_threshold: i64,

    /// Display unit ("bouteille", "casier", "verre").
    pub unit: String,

    /// Soft delete flag.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::new(self.sale_price)
    }

    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::new(self.cost_price)
    }

    /// At or below the threshold (and still on the menu).
    pub fn is_low_stock(&self) -> bool {
        self.is_active && self.stock_quantity <= self.low_stock_threshold
    }

    /// Selling below cost is allowed but worth a warning.
    pub fn sells_below_cost(&self) -> bool {
        self.cost_price > self.sale_price
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle status of an order.
///
/// ```text
/// pending ──▶ preparing ──▶ ready ──▶ served ──▶ paid
///    │            │           │
///    └────────────┴───────────┴──────▶ cancelled
/// ```
///
/// See [`crate::order`] for the transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Served,
    Paid,
    Cancelled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Status & Method
// =============================================================================

/// How much of an order's total has been collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Unpaid
    }
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Notes and coins into the drawer.
    Cash,
    /// Orange Money, Wave, MTN MoMo and the like.
    MobileMoney,
    /// Card on an external terminal.
    Card,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Card => "card",
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// A customer order.
///
/// `total = subtotal - discount` and `subtotal = Σ item.subtotal` hold for
/// every stored order. Nothing changes once it is `paid` or `cancelled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub bar_id: String,

    /// Drawer session the order is attributed to. Set once, never recomputed.
    pub cash_register_id: Option<String>,

    pub created_by: String,
    pub assigned_to: Option<String>,
    pub table_number: Option<String>,
    pub customer_name: Option<String>,

    pub status: OrderStatus,
    pub payment_status: PaymentStatus,

    /// Last method used to pay.
    pub payment_method: Option<PaymentMethod>,

    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
    pub paid_amount: i64,

    /// `max(0, total - paid_amount)` once a payment is recorded.
    pub credit_amount: i64,

    pub notes: Option<String>,

    /// Bumped on every write; lets clients detect stale views.
    pub version: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::new(self.total)
    }

    /// What the customer still owes.
    #[inline]
    pub fn outstanding(&self) -> Money {
        Money::new(self.total - self.paid_amount).floor_zero()
    }

    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        self.assigned_to.as_deref() == Some(user_id)
    }
}

/// A line of an order.
///
/// Name, price and cost are frozen copies taken when the order was created,
/// so later menu edits never rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub unit_cost: i64,
    /// `unit_price × quantity`.
    pub subtotal: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Margin on this line: `(unit_price - unit_cost) × quantity`.
    pub fn profit(&self) -> Money {
        Money::new(self.unit_price - self.unit_cost).multiply_quantity(self.quantity)
    }
}

/// One payment towards an order. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderPayment {
    pub id: String,
    pub order_id: String,
    pub cash_register_id: Option<String>,
    pub method: PaymentMethod,
    pub amount: i64,
    pub recorded_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input line for order creation: which product and how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: i64,
}

impl OrderLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

// =============================================================================
// Inventory
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Delivery or restock.
    In,
    /// Sale, breakage, consumption.
    Out,
    /// Stock count correction, either sign.
    Adjustment,
}

impl MovementType {
    /// Signed stock delta for a requested quantity, or `None` when the
    /// quantity is not valid for this kind of movement.
    ///
    /// ```rust
    /// use maquis_core::MovementType;
    ///
    /// assert_eq!(MovementType::In.signed_delta(5), Some(5));
    /// assert_eq!(MovementType::Out.signed_delta(2), Some(-2));
    /// assert_eq!(MovementType::Adjustment.signed_delta(-3), Some(-3));
    /// assert_eq!(MovementType::Out.signed_delta(-2), None);
    /// assert_eq!(MovementType::Adjustment.signed_delta(0), None);
    /// ```
    pub const fn signed_delta(&self, quantity: i64) -> Option<i64> {
        match self {
            MovementType::In if quantity > 0 => Some(quantity),
            MovementType::Out if quantity > 0 => Some(-quantity),
            MovementType::Adjustment if quantity != 0 => Some(quantity),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Adjustment => "adjustment",
        }
    }
}

/// One committed stock change. `quantity` is the signed delta applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryMovement {
    pub id: String,
    pub bar_id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reason: Option<String>,
    /// Order that caused the movement, if any.
    pub reference_id: Option<String>,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Cash Register
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RegisterStatus {
    Open,
    Closed,
}

/// A cashier's drawer session. Immutable once closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashRegister {
    pub id: String,
    pub bar_id: String,
    pub cashier_id: String,
    pub opening_amount: i64,
    pub closing_amount: Option<i64>,
    pub expected_amount: Option<i64>,
    /// `closing - expected`: positive surplus, negative shortage.
    pub variance: Option<i64>,
    pub status: RegisterStatus,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl CashRegister {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == RegisterStatus::Open
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64, threshold: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            bar_id: "bar-1".to_string(),
            name: "Castel 65cl".to_string(),
            description: None,
            sale_price: 1000,
            cost_price: 650,
            stock_quantity: stock,
            low_stock_threshold: threshold,
            unit: "bouteille".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_role_default_is_waiter() {
        assert_eq!(Role::default(), Role::Waiter);
        assert_eq!(Role::Cashier.to_string(), "cashier");
    }

    #[test]
    fn test_low_stock() {
        assert!(product(5, 5).is_low_stock());
        assert!(!product(6, 5).is_low_stock());

        let mut inactive = product(0, 5);
        inactive.is_active = false;
        assert!(!inactive.is_low_stock());
    }

    #[test]
    fn test_item_profit() {
        let item = OrderItem {
            id: "i-1".to_string(),
            order_id: "o-1".to_string(),
            product_id: "p-1".to_string(),
            product_name: "Castel 65cl".to_string(),
            quantity: 3,
            unit_price: 1000,
            unit_cost: 650,
            subtotal: 3000,
            created_at: Utc::now(),
        };
        assert_eq!(item.profit().amount(), 1050);
    }

    #[test]
    fn test_payment_method_serializes_snake_case() {
        let json = serde_json::to_string(&PaymentMethod::MobileMoney).unwrap();
        assert_eq!(json, "\"mobile_money\"");
    }
}
