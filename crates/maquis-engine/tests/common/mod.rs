//! Fixtures shared by the engine scenario tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use maquis_core::{Bar, CodeSource, Order, OrderLine, Product, RandomCodeSource, Role};
use maquis_db::{Database, DbConfig};
use tempfile::TempDir;
use maquis_engine::{Engine, EngineConfig, EngineError, ErrorCode, NewBar, NewOrder, NewProduct};

pub const OWNER: &str = "owner-1";
pub const CASHIER: &str = "cashier-1";
pub const WAITER: &str = "waiter-1";

/// Engine over a fresh in-memory database with millisecond retry backoff.
pub async fn engine_with(config: EngineConfig) -> Engine {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    Engine::new(db, config)
}

/// Engine over a database file in a fresh temporary directory, so
/// concurrent operations run on separate pooled connections.
///
/// The directory is removed when the returned guard drops.
pub async fn file_engine() -> (TempDir, Engine) {
    file_engine_with(Duration::from_secs(5), fast_config()).await
}

pub async fn file_engine_with(busy_timeout: Duration, config: EngineConfig) -> (TempDir, Engine) {
    let dir = TempDir::new().unwrap();
    let db_config = DbConfig::new(dir.path().join("maquis.db")).busy_timeout(busy_timeout);
    let db = Database::new(db_config).await.unwrap();
    (dir, Engine::new(db, config))
}

pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 5;
    config
}

pub async fn engine() -> Engine {
    engine_with(fast_config()).await
}

/// A bar with an owner, a cashier and a waiter.
pub struct Fixture {
    pub engine: Engine,
    pub bar: Bar,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_engine(engine().await).await
    }

    pub async fn with_engine(engine: Engine) -> Self {
        let bar = create_bar(&engine, OWNER, "Maquis du Carrefour").await;
        join(&engine, &bar, CASHIER, Role::Cashier).await;
        join(&engine, &bar, WAITER, Role::Waiter).await;
        Fixture { engine, bar }
    }

    pub async fn product(&self, name: &str, price: i64, stock: i64) -> Product {
        self.engine
            .inventory()
            .create_product(
                &self.bar.id,
                OWNER,
                NewProduct::new(name, price, price * 6 / 10).initial_stock(stock),
            )
            .await
            .unwrap()
    }

    pub async fn order(&self, actor: &str, lines: &[(&Product, i64)]) -> Order {
        let items = lines
            .iter()
            .map(|(product, qty)| OrderLine::new(&product.id, *qty))
            .collect();
        self.engine
            .orders()
            .create(&self.bar.id, actor, NewOrder::new(items))
            .await
            .unwrap()
    }

    /// Moves an order forward until it reaches `served`.
    pub async fn serve(&self, order: &Order, actor: &str) -> Order {
        let mut order = order.clone();
        while order.status != maquis_core::OrderStatus::Served {
            order = self.engine.orders().advance(&order.id, actor).await.unwrap();
        }
        order
    }

    pub async fn stock(&self, product: &Product) -> i64 {
        self.engine
            .inventory()
            .list_products(&self.bar.id, OWNER, true)
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.id == product.id)
            .map(|p| p.stock_quantity)
            .unwrap()
    }
}

pub async fn create_bar(engine: &Engine, owner: &str, name: &str) -> Bar {
    engine
        .tenants()
        .create(
            owner,
            NewBar {
                name: name.to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

/// Enrolls `user` through the bar's code and gives them `role`.
pub async fn join(engine: &Engine, bar: &Bar, user: &str, role: Role) {
    engine
        .invitations()
        .redeem(&bar.invitation_code, user)
        .await
        .unwrap();
    if role != Role::Waiter {
        engine
            .tenants()
            .change_member_role(&bar.id, &bar.owner_id, user, role)
            .await
            .unwrap();
    }
}

pub fn assert_code<T: std::fmt::Debug>(result: Result<T, EngineError>, code: ErrorCode) {
    match result {
        Err(err) => assert_eq!(err.code, code, "unexpected error: {}", err),
        Ok(value) => panic!("expected {}, got {:?}", code, value),
    }
}

/// Hands out scripted codes first, then random ones.
pub struct ScriptedCodes {
    script: Mutex<VecDeque<String>>,
    fallback: RandomCodeSource,
}

impl ScriptedCodes {
    pub fn new(codes: &[&str]) -> Arc<Self> {
        Arc::new(ScriptedCodes {
            script: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
            fallback: RandomCodeSource::default(),
        })
    }
}

impl CodeSource for ScriptedCodes {
    fn next_code(&self) -> String {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.next_code())
    }
}

/// Always the same code.
pub struct StuckCodes(pub &'static str);

impl CodeSource for StuckCodes {
    fn next_code(&self) -> String {
        self.0.to_string()
    }
}
