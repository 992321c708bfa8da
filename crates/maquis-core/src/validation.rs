//! # Validation Module
//!
//! Input checks that run before any business rule or SQL.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Mobile client                                                │
//! │  └── Immediate feedback on empty fields and keypad typos               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: maquis-engine operation                                      │
//! │  └── THIS MODULE: names, quantities, amounts, ids                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK (stock_quantity >= 0)                                       │
//! │  ├── UNIQUE (invitation_code), partial UNIQUE (open drawer)            │
//! │  └── Foreign keys                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use maquis_core::validation::{validate_name, validate_quantity};
//!
//! validate_name("name", "Chez Tantie").unwrap();
//! validate_quantity(2, 999).unwrap();
//! assert!(validate_quantity(1000, 999).is_err());
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted bar or product name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Largest accepted price, drawer amount or order total (one trillion francs).
///
/// Keeps every line product and running sum far inside `i64`.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Longest accepted free-text note.
pub const MAX_NOTES_LENGTH: usize = 1000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (bar, product).
///
/// ## Rules
/// - Must not be blank
/// - At most 200 characters
///
/// Returns the trimmed name.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(name.to_string())
}

/// Trims optional free text; blank becomes `None`.
///
/// ```rust
/// use maquis_core::validation::validate_optional_text;
///
/// assert_eq!(validate_optional_text("notes", Some("  ")).unwrap(), None);
/// assert_eq!(
///     validate_optional_text("notes", Some(" sans glace ")).unwrap(),
///     Some("sans glace".to_string())
/// );
/// ```
pub fn validate_optional_text(field: &str, text: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    if text.chars().count() > MAX_NOTES_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NOTES_LENGTH,
        });
    }

    Ok(Some(text.to_string()))
}

/// Validates a UUID string.
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an order line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed `max` (999 by default)
pub fn validate_quantity(qty: i64, max: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }

    if qty > max {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max,
        });
    }

    Ok(())
}

/// Validates a price, opening float or counted drawer amount.
pub fn validate_amount(field: &str, amount: i64) -> ValidationResult<()> {
    if amount < 0 {
        return Err(ValidationError::negative(field));
    }
    if amount > MAX_AMOUNT {
        return Err(amount_too_large(field));
    }
    Ok(())
}

/// The error for an amount above [`MAX_AMOUNT`].
pub fn amount_too_large(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: MAX_AMOUNT,
    }
}

/// Validates a payment amount (must be positive).
pub fn validate_payment_amount(amount: i64) -> ValidationResult<()> {
    if amount <= 0 {
        return Err(ValidationError::must_be_positive("payment amount"));
    }
    Ok(())
}

/// Validates the number of lines on an order.
pub fn validate_order_size(lines: usize, max: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::required("items"));
    }

    if lines > max {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: max as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
