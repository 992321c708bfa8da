//! # maquis-core: Pure Business Rules for the MaquisPro Engine
//!
//! Everything in this crate is deterministic and free of I/O. The storage
//! layer (`maquis-db`) persists what these rules decide, and the engine
//! (`maquis-engine`) wires both together behind role checks.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      MaquisPro Engine Layers                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Mobile client (out of scope)                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    maquis-engine                                │   │
//! │  │    create_order, advance, open_register, redeem, ...           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ maquis-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐ ┌────────┐  │   │
//! │  │   │  types  │ │  order  │ │ register │ │ access │ │ stats  │  │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └────────┘ └────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    maquis-db (SQLite)                           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities (Bar, Membership, Product, Order, CashRegister, ...)
//! - [`money`] - Integer money type
//! - [`order`] - Order state machine, totals and payment application
//! - [`register`] - Cash drawer reconciliation
//! - [`access`] - Role gates per operation
//! - [`invitation`] - Join code alphabet, sampling and normalization
//! - [`stats`] - Dashboard and drawer projections
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example
//!
//! ```rust
//! use maquis_core::OrderStatus;
//!
//! assert_eq!(OrderStatus::Pending.next(), Some(OrderStatus::Preparing));
//! assert_eq!(OrderStatus::Paid.next(), None);
//! assert!(!OrderStatus::Served.is_cancellable());
//! ```

pub mod access;
pub mod error;
pub mod invitation;
pub mod money;
pub mod order;
pub mod register;
pub mod stats;
pub mod types;
pub mod validation;

pub use access::Operation;
pub use error::{CoreError, CoreResult, ValidationError};
pub use invitation::{CodeSource, RandomCodeSource};
pub use money::Money;
pub use order::{OrderTotals, PaymentState, PricedLine};
pub use register::{Reconciliation, VarianceOutcome};
pub use stats::{CashRegisterSummary, DashboardStats, TimeWindow};
pub use types::*;

/// Maximum distinct lines allowed in a single order.
pub const MAX_ORDER_ITEMS: usize = 100;

/// Maximum quantity on one order line.
///
/// Catches typing 1000 instead of 10 on a phone keypad.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Length of a bar's invitation (join) code.
pub const INVITATION_CODE_LENGTH: usize = 8;
