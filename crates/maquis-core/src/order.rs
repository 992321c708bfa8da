//! # Order Module
//!
//! The order state machine, line pricing and payment arithmetic.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   pending ──advance──▶ preparing ──advance──▶ ready ──advance──▶ served │
//! │      │                     │                    │                  │    │
//! │      │ cancel              │ cancel             │ cancel           │    │
//! │      ▼                     ▼                    ▼               advance │
//! │   ┌───────────────────────────────────────────────┐                │    │
//! │   │                  cancelled                    │                ▼    │
//! │   └───────────────────────────────────────────────┘              paid   │
//! │                                                                         │
//! │   Side effects (applied by the engine in the same transaction):        │
//! │   • → served : one inventory OUT movement per order line               │
//! │   • → paid   : attribution to the cashier's open drawer session        │
//! │                                                                         │
//! │   paid and cancelled are terminal. A served order cannot be cancelled. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Payments
//! Payments are taken only while the order is `served`. Each one raises
//! `paid_amount` and recomputes `credit_amount = max(0, total - paid_amount)`.
//! Reaching `paid` does not require full settlement: whatever is still owed
//! stays on the order as credit.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Order, OrderLine, OrderStatus, PaymentStatus, Product};
use crate::validation::{
    amount_too_large, validate_amount, validate_order_size, validate_quantity, ValidationResult,
    MAX_AMOUNT,
};

// =============================================================================
// State Machine
// =============================================================================

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Served,
        OrderStatus::Paid,
        OrderStatus::Cancelled,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Served => "served",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// The unique successor reached by `advance`, if any.
    pub const fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Preparing),
            OrderStatus::Preparing => Some(OrderStatus::Ready),
            OrderStatus::Ready => Some(OrderStatus::Served),
            OrderStatus::Served => Some(OrderStatus::Paid),
            OrderStatus::Paid | OrderStatus::Cancelled => None,
        }
    }

    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }

    /// Only orders that have not reached the table can be cancelled.
    #[inline]
    pub const fn is_cancellable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Preparing | OrderStatus::Ready
        )
    }

    /// Whether `to` is reachable from `self` in one step.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        self.next() == Some(to) || (to == OrderStatus::Cancelled && self.is_cancellable())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: format!("unknown order status '{}'", s),
            })
    }
}

/// Successor of `from` for an `advance` call.
///
/// ## Errors
/// `InvalidTransition` when `from` is terminal.
pub fn advance_target(order_id: &str, from: OrderStatus) -> CoreResult<OrderStatus> {
    from.next().ok_or_else(|| invalid_transition(order_id, from, "advance"))
}

/// Checks that an order in `from` may be cancelled.
pub fn ensure_cancellable(order_id: &str, from: OrderStatus) -> CoreResult<()> {
    if from.is_cancellable() {
        Ok(())
    } else {
        Err(invalid_transition(order_id, from, "cancel"))
    }
}

/// Checks that `waiter_id` may claim the order with `accept`.
///
/// The order must still be pending and either unassigned or already
/// assigned to this waiter.
pub fn ensure_acceptable(order: &Order, waiter_id: &str) -> CoreResult<()> {
    if order.status != OrderStatus::Pending {
        return Err(invalid_transition(&order.id, order.status, "accept"));
    }

    match order.assigned_to.as_deref() {
        None => Ok(()),
        Some(assignee) if assignee == waiter_id => Ok(()),
        Some(_) => Err(invalid_transition(&order.id, order.status, "accept")),
    }
}

/// Checks that the order can still be (re)assigned.
pub fn ensure_assignable(order: &Order) -> CoreResult<()> {
    if order.status.is_terminal() {
        return Err(invalid_transition(&order.id, order.status, "assign"));
    }
    Ok(())
}

pub(crate) fn invalid_transition(order_id: &str, from: OrderStatus, action: &str) -> CoreError {
    CoreError::InvalidTransition {
        order_id: order_id.to_string(),
        from: from.as_str().to_string(),
        action: action.to_string(),
    }
}

// =============================================================================
// Lines & Totals
// =============================================================================

/// Checks and normalizes the requested lines of a new order.
///
/// Duplicate products are merged into one line, keeping the position of
/// their first appearance. Limits apply to the merged result.
///
/// ```rust
/// use maquis_core::order::normalize_lines;
/// use maquis_core::OrderLine;
///
/// let lines = vec![
///     OrderLine::new("beer", 1),
///     OrderLine::new("soda", 1),
///     OrderLine::new("beer", 2),
/// ];
/// let merged = normalize_lines(&lines, 100, 999).unwrap();
/// assert_eq!(merged, vec![OrderLine::new("beer", 3), OrderLine::new("soda", 1)]);
/// ```
pub fn normalize_lines(
    lines: &[OrderLine],
    max_items: usize,
    max_quantity: i64,
) -> ValidationResult<Vec<OrderLine>> {
    if lines.is_empty() {
        return Err(ValidationError::required("items"));
    }

    let mut merged: Vec<OrderLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::required("product_id"));
        }
        validate_quantity(line.quantity, max_quantity)?;

        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => existing.quantity += line.quantity,
            None => merged.push(line.clone()),
        }
    }

    for line in &merged {
        validate_quantity(line.quantity, max_quantity)?;
    }
    validate_order_size(merged.len(), max_items)?;

    Ok(merged)
}

/// An order line with the product data frozen at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub unit_cost: i64,
}

impl PricedLine {
    /// Prices `quantity` units of `product` for order `bar_id`.
    ///
    /// ## Errors
    /// `ValidationError` when the product is inactive or belongs to another bar.
    pub fn from_product(bar_id: &str, product: &Product, quantity: i64) -> ValidationResult<Self> {
        if product.bar_id != bar_id {
            return Err(ValidationError::InvalidFormat {
                field: "product_id".to_string(),
                reason: format!("product {} does not belong to this bar", product.id),
            });
        }
        if !product.is_active {
            return Err(ValidationError::InvalidFormat {
                field: "product_id".to_string(),
                reason: format!("{} is no longer on the menu", product.name),
            });
        }

        Ok(Self {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity,
            unit_price: product.sale_price,
            unit_cost: product.cost_price,
        })
    }

    /// `unit_price × quantity`.
    ///
    /// ## Errors
    /// `OutOfRange` when the product exceeds [`MAX_AMOUNT`].
    pub fn subtotal(&self) -> ValidationResult<Money> {
        Money::new(self.unit_price)
            .checked_multiply_quantity(self.quantity)
            .filter(|m| m.amount() <= MAX_AMOUNT)
            .ok_or_else(|| amount_too_large("subtotal"))
    }
}

/// Derived totals of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
}

impl OrderTotals {
    /// `subtotal = Σ unit_price × quantity`, `total = subtotal - discount`.
    ///
    /// ```rust
    /// use maquis_core::order::{OrderTotals, PricedLine};
    ///
    /// let lines = vec![PricedLine {
    ///     product_id: "p".into(),
    ///     product_name: "Flag".into(),
    ///     quantity: 2,
    ///     unit_price: 1000,
    ///     unit_cost: 600,
    /// }];
    /// let totals = OrderTotals::compute(&lines, 500).unwrap();
    /// assert_eq!(totals.total.amount(), 1500);
    /// ```
    ///
    /// ## Errors
    /// Discount below zero or above the subtotal, or a subtotal above
    /// [`MAX_AMOUNT`].
    pub fn compute(lines: &[PricedLine], discount: i64) -> ValidationResult<Self> {
        let subtotal = lines.iter().try_fold(Money::zero(), |acc, line| {
            acc.checked_add(line.subtotal()?)
                .filter(|m| m.amount() <= MAX_AMOUNT)
                .ok_or_else(|| amount_too_large("subtotal"))
        })?;

        validate_amount("discount", discount)?;
        if discount > subtotal.amount() {
            return Err(ValidationError::OutOfRange {
                field: "discount".to_string(),
                min: 0,
                max: subtotal.amount(),
            });
        }

        let discount = Money::new(discount);
        Ok(Self {
            subtotal,
            discount,
            total: subtotal - discount,
        })
    }
}

// =============================================================================
// Payments
// =============================================================================

impl PaymentStatus {
    /// Classifies an order from what has been collected against its total.
    pub fn for_amounts(total: i64, paid: i64) -> Self {
        if paid > 0 && paid >= total {
            PaymentStatus::Paid
        } else if paid > 0 {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Unpaid
        }
    }
}

/// Payment fields of an order after a payment is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentState {
    pub paid_amount: i64,
    pub credit_amount: i64,
    pub payment_status: PaymentStatus,
}

impl PaymentState {
    /// Applies a payment of `amount` to `order`.
    ///
    /// ## Errors
    /// - `PaymentNotAccepted` unless the order is `served`
    /// - `Validation` when `amount <= 0`
    /// - `Overpayment` when `amount` exceeds what is still owed
    pub fn apply(order: &Order, amount: i64) -> CoreResult<Self> {
        if order.status != OrderStatus::Served {
            return Err(CoreError::PaymentNotAccepted {
                order_id: order.id.clone(),
                status: order.status.as_str().to_string(),
            });
        }

        crate::validation::validate_payment_amount(amount)?;

        let outstanding = order.outstanding().amount();
        if amount > outstanding {
            return Err(CoreError::Overpayment {
                outstanding,
                attempted: amount,
            });
        }

        let paid_amount = order.paid_amount + amount;
        Ok(Self {
            paid_amount,
            credit_amount: Money::new(order.total - paid_amount).floor_zero().amount(),
            payment_status: PaymentStatus::for_amounts(order.total, paid_amount),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order(status: OrderStatus, total: i64, paid: i64) -> Order {
        let now = Utc::now();
        Order {
            id: "o-1".to_string(),
            bar_id: "bar-1".to_string(),
            cash_register_id: None,
            created_by: "waiter-1".to_string(),
            assigned_to: None,
            table_number: Some("4".to_string()),
            customer_name: None,
            status,
            payment_status: PaymentStatus::for_amounts(total, paid),
            payment_method: None,
            subtotal: total,
            discount: 0,
            total,
            paid_amount: paid,
            credit_amount: 0,
            notes: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn line(name: &str, qty: i64, price: i64) -> PricedLine {
        PricedLine {
            product_id: name.to_string(),
            product_name: name.to_string(),
            quantity: qty,
            unit_price: price,
            unit_cost: price / 2,
        }
    }

    #[test]
    fn test_transition_table_is_closed() {
        let allowed: Vec<(OrderStatus, OrderStatus)> = OrderStatus::ALL
            .iter()
            .flat_map(|from| OrderStatus::ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();

        use OrderStatus::*;
        assert_eq!(
            allowed,
            vec![
                (Pending, Preparing),
                (Pending, Cancelled),
                (Preparing, Ready),
                (Preparing, Cancelled),
                (Ready, Served),
                (Ready, Cancelled),
                (Served, Paid),
            ]
        );
    }

    #[test]
    fn test_advance_from_terminal_fails() {
        assert!(matches!(
            advance_target("o-1", OrderStatus::Paid),
            Err(CoreError::InvalidTransition { .. })
        ));
        assert!(advance_target("o-1", OrderStatus::Cancelled).is_err());
        assert_eq!(
            advance_target("o-1", OrderStatus::Ready).unwrap(),
            OrderStatus::Served
        );
    }

    #[test]
    fn test_cancel_rules() {
        assert!(ensure_cancellable("o-1", OrderStatus::Ready).is_ok());
        assert!(ensure_cancellable("o-1", OrderStatus::Served).is_err());
        assert!(ensure_cancellable("o-1", OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("Served".parse::<OrderStatus>().unwrap(), OrderStatus::Served);
        assert!("done".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_accept_rules() {
        let mut o = order(OrderStatus::Pending, 1000, 0);
        assert!(ensure_acceptable(&o, "waiter-2").is_ok());

        o.assigned_to = Some("waiter-2".to_string());
        assert!(ensure_acceptable(&o, "waiter-2").is_ok());
        assert!(ensure_acceptable(&o, "waiter-3").is_err());

        o.status = OrderStatus::Preparing;
        assert!(ensure_acceptable(&o, "waiter-2").is_err());
    }

    #[test]
    fn test_normalize_lines_rejects_bad_input() {
        assert!(normalize_lines(&[], 100, 999).is_err());
        assert!(normalize_lines(&[OrderLine::new("p", 0)], 100, 999).is_err());
        assert!(normalize_lines(&[OrderLine::new("p", -2)], 100, 999).is_err());
        // Merging can push a line over the limit.
        assert!(
            normalize_lines(&[OrderLine::new("p", 600), OrderLine::new("p", 600)], 100, 999)
                .is_err()
        );
    }

    #[test]
    fn test_totals() {
        let lines = vec![line("flag", 2, 1000), line("coca", 1, 500)];
        let totals = OrderTotals::compute(&lines, 0).unwrap();
        assert_eq!(totals.subtotal.amount(), 2500);
        assert_eq!(totals.total.amount(), 2500);

        let discounted = OrderTotals::compute(&lines, 2500).unwrap();
        assert!(discounted.total.is_zero());

        assert!(OrderTotals::compute(&lines, -1).is_err());
        assert!(OrderTotals::compute(&lines, 2501).is_err());
    }

    #[test]
    fn test_totals_reject_overflowing_lines() {
        let huge = line("cognac", 3, i64::MAX / 2);
        assert!(matches!(
            huge.subtotal(),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "subtotal"
        ));
        assert!(OrderTotals::compute(&[huge], 0).is_err());

        // Each line fits, the sum does not.
        let big = line("champagne", 1, MAX_AMOUNT);
        assert_eq!(big.subtotal().unwrap().amount(), MAX_AMOUNT);
        assert!(OrderTotals::compute(&[big.clone(), line("flag", 1, 1000)], 0).is_err());
        assert_eq!(OrderTotals::compute(&[big], 0).unwrap().total.amount(), MAX_AMOUNT);
    }

    #[test]
    fn test_partial_then_full_payment() {
        let mut o = order(OrderStatus::Served, 2500, 0);

        let first = PaymentState::apply(&o, 1500).unwrap();
        assert_eq!(first.paid_amount, 1500);
        assert_eq!(first.credit_amount, 1000);
        assert_eq!(first.payment_status, PaymentStatus::Partial);

        o.paid_amount = first.paid_amount;
        let second = PaymentState::apply(&o, 1000).unwrap();
        assert_eq!(second.paid_amount, 2500);
        assert_eq!(second.credit_amount, 0);
        assert_eq!(second.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_payment_rejections() {
        let o = order(OrderStatus::Ready, 2500, 0);
        assert!(matches!(
            PaymentState::apply(&o, 500),
            Err(CoreError::PaymentNotAccepted { .. })
        ));

        let o = order(OrderStatus::Served, 2500, 2000);
        assert!(matches!(
            PaymentState::apply(&o, 600),
            Err(CoreError::Overpayment {
                outstanding: 500,
                attempted: 600
            })
        ));
        assert!(matches!(
            PaymentState::apply(&o, 0),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_payment_status_for_amounts() {
        assert_eq!(PaymentStatus::for_amounts(1000, 0), PaymentStatus::Unpaid);
        assert_eq!(PaymentStatus::for_amounts(1000, 1), PaymentStatus::Partial);
        assert_eq!(PaymentStatus::for_amounts(1000, 1000), PaymentStatus::Paid);
    }
}
