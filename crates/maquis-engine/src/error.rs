//! # Engine Error Type
//!
//! The one error every engine operation returns.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in MaquisPro                              │
//! │                                                                         │
//! │  maquis-core rule ── CoreError::InvalidTransition ──┐                   │
//! │                                                      │                  │
//! │  input check ─────── ValidationError ───────────────┤                  │
//! │                                                      ▼                  │
//! │  maquis-db ───────── DbError::UniqueViolation ──► EngineError          │
//! │                      DbError::Busy                 { code, message }   │
//! │                                                      │                  │
//! │                                                      ▼                  │
//! │  Client: switch (e.code) { case 'CONFLICT': ... }                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Store failures are logged here with their detail and reach the client as
//! `TRANSIENT` with a generic message.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use maquis_core::{CoreError, ValidationError};
use maquis_db::DbError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Error returned by engine operations.
///
/// ## Serialization
/// ```json
/// {
///   "code": "CONFLICT",
///   "message": "A cash drawer is already open for this cashier"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("[{code}] {message}")]
pub struct EngineError {
    /// Machine-readable kind.
    pub code: ErrorCode,

    /// Human-readable, actionable message.
    pub message: String,
}

/// Stable error kinds.
///
/// ## Usage in the Client
/// ```typescript
/// switch (e.code) {
///   case 'INSUFFICIENT_STOCK': showRestockHint(e.message); break;
///   case 'CONFLICT':           reloadOrder(); break;
///   case 'TRANSIENT':          retryLater(); break;
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input failed validation.
    ValidationError,

    /// The order or drawer is not in a state that allows the action.
    InvalidTransition,

    /// Lost a race, or a uniqueness rule refused the write.
    Conflict,

    /// A stock decrease would go below zero.
    InsufficientStock,

    NotFound,

    /// No bar holds this invitation code.
    InvalidCode,

    /// The actor's role in the bar does not allow the operation.
    Forbidden,

    /// Store failure. Safe to retry.
    Transient,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::InvalidTransition => "INVALID_TRANSITION",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InvalidCode => "INVALID_CODE",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::Transient => "TRANSIENT",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EngineError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        EngineError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        EngineError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::new(ErrorCode::ValidationError, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        EngineError::new(ErrorCode::Conflict, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        EngineError::new(ErrorCode::Forbidden, message)
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        EngineError::new(ErrorCode::InvalidTransition, message)
    }

    /// A guarded write found the order in another state than the one read.
    pub fn order_changed(order_id: &str) -> Self {
        EngineError::conflict(format!(
            "Order {} was changed by someone else; reload it and try again",
            order_id
        ))
    }

    pub fn is_transient(&self) -> bool {
        self.code == ErrorCode::Transient
    }
}

/// Converts database errors to engine errors.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => {
                EngineError::conflict(unique_violation_message(&field, &value))
            }
            DbError::ForeignKeyViolation { message } => {
                error!("Foreign key violation: {}", message);
                EngineError::validation("Invalid reference")
            }
            DbError::CheckViolation { message } => {
                error!("Check constraint failed: {}", message);
                EngineError::validation("The change would break a data rule")
            }
            DbError::Busy(e) => {
                error!("Database busy: {}", e);
                EngineError::new(ErrorCode::Transient, "The database is busy, try again")
            }
            DbError::PoolExhausted => {
                error!("Database pool exhausted");
                EngineError::new(ErrorCode::Transient, "The database is busy, try again")
            }
            DbError::Io(e) => {
                error!("Database I/O error: {}", e);
                EngineError::new(ErrorCode::Transient, "Database operation failed")
            }
            DbError::ConnectionFailed(e) => {
                error!("Database connection failed: {}", e);
                EngineError::new(ErrorCode::Transient, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                error!("Database migration failed: {}", e);
                EngineError::new(ErrorCode::Transient, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                error!("Database query failed: {}", e);
                EngineError::new(ErrorCode::Transient, "Database operation failed")
            }
            DbError::Internal(e) => {
                error!("Internal database error: {}", e);
                EngineError::new(ErrorCode::Transient, "Database operation failed")
            }
        }
    }
}

/// Turns the constraint SQLite names into something a cashier can act on.
fn unique_violation_message(field: &str, value: &str) -> String {
    if field.contains("cash_registers") {
        "A cash drawer is already open for this cashier; close it first".to_string()
    } else if field.contains("invitation_code") {
        "This invitation code is already in use".to_string()
    } else if field.contains("bar_members") {
        "This user is already a member of the bar".to_string()
    } else {
        format!("{} '{}' already exists", field, value)
    }
}

/// Converts core errors to engine errors.
impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::InvalidTransition { .. } => {
                EngineError::new(ErrorCode::InvalidTransition, message)
            }
            CoreError::PermissionDenied { .. } => EngineError::new(ErrorCode::Forbidden, message),
            CoreError::InsufficientStock { .. } => {
                EngineError::new(ErrorCode::InsufficientStock, message)
            }
            CoreError::PaymentNotAccepted { .. } => {
                EngineError::new(ErrorCode::InvalidTransition, message)
            }
            CoreError::Overpayment { .. } => EngineError::new(ErrorCode::ValidationError, message),
            CoreError::RegisterClosed(_) => EngineError::new(ErrorCode::InvalidTransition, message),
            CoreError::InvalidCode(_) => EngineError::new(ErrorCode::InvalidCode, message),
            CoreError::Validation(e) => EngineError::from(e),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_drawer_violation_reads_as_conflict() {
        let err = EngineError::from(DbError::duplicate(
            "cash_registers.bar_id, cash_registers.cashier_id",
            "unknown",
        ));
        assert_eq!(err.code, ErrorCode::Conflict);
        assert!(err.message.contains("already open"));
    }

    #[test]
    fn test_store_failures_are_transient() {
        assert!(EngineError::from(DbError::PoolExhausted).is_transient());
        assert!(EngineError::from(DbError::Busy("database is locked".into())).is_transient());
        assert!(!EngineError::from(DbError::not_found("Order", "o-1")).is_transient());
    }

    #[test]
    fn test_core_mapping() {
        let err = EngineError::from(CoreError::RegisterClosed("r-1".into()));
        assert_eq!(err.code, ErrorCode::InvalidTransition);

        let err = EngineError::from(CoreError::Validation(ValidationError::required("items")));
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = EngineError::from(CoreError::InvalidCode("ZZZ".into()));
        assert_eq!(err.code, ErrorCode::InvalidCode);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(EngineError::forbidden("nope")).unwrap();
        assert_eq!(json["code"], "FORBIDDEN");
        assert_eq!(json["message"], "nope");
    }
}
