//! # Error Types
//!
//! Domain-specific error types for maquis-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  maquis-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  maquis-db errors                                                      │
//! │  └── DbError          - Store failures, constraint violations          │
//! │                                                                         │
//! │  maquis-engine errors                                                  │
//! │  └── EngineError      - Stable kind + actionable message for clients   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError ← DbError             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The order state machine has no such move.
    ///
    /// ## When This Occurs
    /// - `advance` on a `paid` or `cancelled` order
    /// - `cancel` on a `served` order
    /// - A waiter advancing an order assigned to someone else
    #[error("Order {order_id} cannot {action} while {from}")]
    InvalidTransition {
        order_id: String,
        from: String,
        action: String,
    },

    /// The actor's role in the bar does not allow the operation.
    #[error("A {role} is not allowed to {action}")]
    PermissionDenied { role: String, action: String },

    /// A stock decrease would take the product below zero.
    ///
    /// ## User Workflow
    /// ```text
    /// Advance order to "served" (2 × Flag 65cl)
    ///      │
    ///      ▼
    /// Check stock: available=1
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Flag 65cl", available: 1, requested: 2 }
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Payments are only taken once the order has been served.
    #[error("Order {order_id} is {status}; payments are accepted once it is served")]
    PaymentNotAccepted { order_id: String, status: String },

    /// Payment larger than what is still owed.
    #[error("Payment of {attempted} exceeds the outstanding balance of {outstanding}")]
    Overpayment { outstanding: i64, attempted: i64 },

    /// The drawer session was already reconciled.
    #[error("Cash register {0} is already closed")]
    RegisterClosed(String),

    /// No bar holds this join code.
    #[error("Invalid invitation code: {0}")]
    InvalidCode(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business rule runs; always the caller's fault.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} cannot be negative")]
    Negative { field: String },

    /// Invalid format (e.g., invalid UUID, malformed code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }

    pub fn negative(field: impl Into<String>) -> Self {
        ValidationError::Negative {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
