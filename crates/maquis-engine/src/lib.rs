//! # maquis-engine: Order Fulfillment and Cash Drawer Engine
//!
//! What a MaquisPro client calls. Each service borrows the [`Engine`] and
//! exposes the operations of one ledger.
//!
//! ## Module Organization
//! ```text
//! maquis_engine/
//! ├── lib.rs          ◄─── Engine handle and service accessors
//! ├── config.rs       ◄─── EngineConfig (defaults, TOML, MAQUIS_* env)
//! ├── error.rs        ◄─── EngineError { code, message }
//! ├── retry.rs        ◄─── Transient failure retry with backoff
//! ├── access.rs       ◄─── Role resolution from ownership / membership
//! ├── tenants.rs      ◄─── Bars, members, current-bar selection
//! ├── invitations.rs  ◄─── Join codes: generate, redeem
//! ├── inventory.rs    ◄─── Products and the stock movement ledger
//! ├── orders.rs       ◄─── Order lifecycle and payments
//! ├── registers.rs    ◄─── Drawer sessions and reconciliation
//! └── dashboard.rs    ◄─── Read-only rollups
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use maquis_engine::{Engine, EngineConfig};
//!
//! let engine = Engine::connect(EngineConfig::load(None)?).await?;
//! let order = engine.orders().create(&bar_id, &waiter_id, new_order).await?;
//! let order = engine.orders().advance(&order.id, &waiter_id).await?;
//! ```

pub mod access;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod inventory;
pub mod invitations;
pub mod orders;
pub mod registers;
pub mod retry;
pub mod tenants;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use maquis_core::{CodeSource, RandomCodeSource};
use maquis_db::Database;

pub use config::{ConfigError, EngineConfig};
pub use dashboard::DashboardService;
pub use error::{EngineError, EngineResult, ErrorCode};
pub use inventory::{InventoryService, NewMovement, NewProduct, ProductUpdate, StockUpdate};
pub use invitations::InvitationService;
pub use orders::{NewOrder, OrderService};
pub use registers::RegisterService;
pub use retry::RetryPolicy;
pub use tenants::{BarUpdate, NewBar, TenantService};

/// Shared handle to the engine.
///
/// Cheap to clone: clones share the pool, the configuration and the
/// tenant selections.
#[derive(Clone)]
pub struct Engine {
    db: Database,
    config: Arc<EngineConfig>,
    codes: Arc<dyn CodeSource>,
    /// Current bar per actor. Process-scoped, never persisted.
    selections: Arc<RwLock<HashMap<String, String>>>,
    retry: RetryPolicy,
}

impl Engine {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        let codes = Arc::new(RandomCodeSource::new(config.invitations.code_length));
        let retry = RetryPolicy::new(&config.retry);

        Engine {
            db,
            config: Arc::new(config),
            codes,
            selections: Arc::new(RwLock::new(HashMap::new())),
            retry,
        }
    }

    /// Opens the configured database, runs migrations and builds the engine.
    pub async fn connect(config: EngineConfig) -> EngineResult<Self> {
        let db = Database::new(config.db_config()).await?;
        info!(path = %config.database_path().display(), "Engine connected");
        Ok(Engine::new(db, config))
    }

    /// Replaces where invitation code candidates come from.
    pub fn with_code_source(mut self, codes: Arc<dyn CodeSource>) -> Self {
        self.codes = codes;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Services
    // =========================================================================

    pub fn tenants(&self) -> TenantService<'_> {
        TenantService::new(self)
    }

    pub fn invitations(&self) -> InvitationService<'_> {
        InvitationService::new(self)
    }

    pub fn inventory(&self) -> InventoryService<'_> {
        InventoryService::new(self)
    }

    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(self)
    }

    pub fn registers(&self) -> RegisterService<'_> {
        RegisterService::new(self)
    }

    pub fn dashboard(&self) -> DashboardService<'_> {
        DashboardService::new(self)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("db", &self.db)
            .field("config", &self.config)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
