//! # Repository Module
//!
//! Database repository implementations for the MaquisPro store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  maquis-engine operation (advance order to "served")                   │
//! │       │                                                                 │
//! │       │  let mut tx = db.begin().await?;                               │
//! │       ▼                                                                 │
//! │  OrderRepository::transition(&mut *tx, ...)    status guard            │
//! │  ProductRepository::adjust_stock(&mut *tx, ...) stock guard            │
//! │  InventoryRepository::insert(&mut *tx, ...)    ledger row              │
//! │       │                                                                 │
//! │       │  tx.commit().await?;                                           │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Methods that take an `executor` run on whatever they are given: the   │
//! │  pool for a one-off read, `&mut *tx` inside a transaction. Methods     │
//! │  without one are read-only listings on the repository's pool.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`BarRepository`] - Bars and their invitation codes
//! - [`MemberRepository`] - Memberships and roles
//! - [`ProductRepository`] - Menu and guarded stock updates
//! - [`OrderRepository`] - Orders, items, payments, guarded status writes
//! - [`InventoryRepository`] - Append-only movement ledger
//! - [`RegisterRepository`] - Drawer sessions

pub mod bar;
pub mod inventory;
pub mod member;
pub mod order;
pub mod product;
pub mod register;

pub use bar::BarRepository;
pub use inventory::InventoryRepository;
pub use member::MemberRepository;
pub use order::{OrderFilter, OrderRepository, PaymentUpdate};
pub use product::ProductRepository;
pub use register::{RegisterClosing, RegisterRepository};

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the repository tests.

    use chrono::Utc;
    use maquis_core::{Bar, Membership, Product, Role};
    use uuid::Uuid;

    use crate::pool::{Database, DbConfig};

    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub fn bar(owner_id: &str, name: &str, code: &str) -> Bar {
        let now = Utc::now();
        Bar {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            description: None,
            address: None,
            phone: None,
            invitation_code: code.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn membership(bar_id: &str, user_id: &str, role: Role) -> Membership {
        Membership {
            id: Uuid::new_v4().to_string(),
            bar_id: bar_id.to_string(),
            user_id: user_id.to_string(),
            role,
            is_active: true,
            joined_at: Utc::now(),
        }
    }

    pub fn product(bar_id: &str, name: &str, price: i64, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            bar_id: bar_id.to_string(),
            name: name.to_string(),
            description: None,
            sale_price: price,
            cost_price: price / 2,
            stock_quantity: stock,
            low_stock_threshold: 5,
            unit: "bouteille".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Inserts a bar owned by `owner_id`.
    pub async fn seed_bar(db: &Database, owner_id: &str, name: &str, code: &str) -> Bar {
        let bar = bar(owner_id, name, code);
        db.bars().insert(db.pool(), &bar).await.unwrap();
        bar
    }
}
