//! # maquis-db: Storage Layer for the MaquisPro Engine
//!
//! SQLite persistence for bars, memberships, products, orders, payments,
//! inventory movements and drawer sessions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MaquisPro Data Flow                              │
//! │                                                                         │
//! │  maquis-engine (advance, open_register, redeem, ...)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     maquis-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │   │   │
//! │  │   │               │    │ BarRepository  │   │              │   │   │
//! │  │   │ SqlitePool    │◄───│ OrderRepository│   │ 001_initial_ │   │   │
//! │  │   │ begin()       │    │ RegisterRepo.. │   │   schema.sql │   │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL, foreign keys on)                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use maquis_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("maquis.db")).await?;
//! let bars = db.bars().list_accessible(&user_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::{
    BarRepository, InventoryRepository, MemberRepository, OrderFilter, OrderRepository,
    PaymentUpdate, ProductRepository, RegisterClosing, RegisterRepository,
};
