//! # Cash Register Module
//!
//! Drawer reconciliation at the end of a cashier's session.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  open_register(opening = 5000)                                         │
//! │        │                                                                │
//! │        │   orders finalized under this session: 2000 + 1000            │
//! │        ▼                                                                │
//! │  close_register(counted = 8200)                                        │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  expected = 5000 + 3000 = 8000                                         │
//! │  variance = 8200 - 8000 = +200   (Surplus)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only orders attributed to the session count. Attribution is stored on the
//! order when it is finalized and never recomputed, so closing the same
//! session twice over the same data always yields the same numbers.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::CashRegister;
use crate::validation::{amount_too_large, validate_amount};

/// Which way the count went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceOutcome {
    Surplus,
    Shortage,
    Exact,
}

/// Figures written when a drawer session is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub opening_amount: Money,
    pub sales: Money,
    pub expected_amount: Money,
    pub closing_amount: Money,
    /// `closing - expected`.
    pub variance: Money,
}

impl Reconciliation {
    /// Reconciles a drawer.
    ///
    /// `attributed_totals` are the totals of the orders finalized under the
    /// session.
    ///
    /// ```rust
    /// use maquis_core::register::{Reconciliation, VarianceOutcome};
    ///
    /// let r = Reconciliation::compute(5000, [2000, 1000], 8200).unwrap();
    /// assert_eq!(r.expected_amount.amount(), 8000);
    /// assert_eq!(r.variance.amount(), 200);
    /// assert_eq!(r.outcome(), VarianceOutcome::Surplus);
    /// ```
    pub fn compute<I>(opening: i64, attributed_totals: I, closing: i64) -> CoreResult<Self>
    where
        I: IntoIterator<Item = i64>,
    {
        validate_amount("closing amount", closing)?;

        let opening_amount = Money::new(opening);
        let sales = attributed_totals
            .into_iter()
            .try_fold(Money::zero(), |acc, total| acc.checked_add(Money::new(total)))
            .ok_or_else(|| amount_too_large("sales"))?;
        let expected_amount = opening_amount
            .checked_add(sales)
            .ok_or_else(|| amount_too_large("expected amount"))?;
        let closing_amount = Money::new(closing);

        Ok(Self {
            opening_amount,
            sales,
            expected_amount,
            closing_amount,
            variance: closing_amount - expected_amount,
        })
    }

    pub fn outcome(&self) -> VarianceOutcome {
        if self.variance.is_positive() {
            VarianceOutcome::Surplus
        } else if self.variance.is_negative() {
            VarianceOutcome::Shortage
        } else {
            VarianceOutcome::Exact
        }
    }
}

/// Fails with `RegisterClosed` unless the session is still open.
pub fn ensure_open(register: &CashRegister) -> CoreResult<()> {
    if register.is_open() {
        Ok(())
    } else {
        Err(CoreError::RegisterClosed(register.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RegisterStatus;
    use chrono::Utc;

    #[test]
    fn test_shortage_and_exact() {
        let short = Reconciliation::compute(5000, [3000], 7500).unwrap();
        assert_eq!(short.variance.amount(), -500);
        assert_eq!(short.outcome(), VarianceOutcome::Shortage);

        let exact = Reconciliation::compute(0, Vec::new(), 0).unwrap();
        assert_eq!(exact.expected_amount, Money::zero());
        assert_eq!(exact.outcome(), VarianceOutcome::Exact);
    }

    #[test]
    fn test_negative_count_rejected() {
        assert!(matches!(
            Reconciliation::compute(5000, [1000], -1),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_ensure_open() {
        let mut register = CashRegister {
            id: "r-1".to_string(),
            bar_id: "bar-1".to_string(),
            cashier_id: "cashier-1".to_string(),
            opening_amount: 5000,
            closing_amount: None,
            expected_amount: None,
            variance: None,
            status: RegisterStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
            notes: None,
        };
        assert!(ensure_open(&register).is_ok());

        register.status = RegisterStatus::Closed;
        assert!(matches!(
            ensure_open(&register),
            Err(CoreError::RegisterClosed(id)) if id == "r-1"
        ));
    }
}
