//! # Demo Bar Seeder
//!
//! Creates a demo bar and walks one order through its whole life, for
//! manual runs against a real database file.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database
//! cargo run -p maquis-engine --bin seed
//!
//! # Specify database path
//! cargo run -p maquis-engine --bin seed -- --db ./maquis_dev.db
//! ```
//!
//! ## What Gets Created
//! - Bar "Maquis Chez Tantie" owned by `owner-demo`
//! - A cashier and a waiter who joined with the invitation code
//! - A small drinks and grills menu with opening stock
//! - One order served, paid and counted into a closed drawer

use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use maquis_core::{OrderLine, PaymentMethod, Role};
use maquis_engine::{Engine, EngineConfig, NewBar, NewOrder, NewProduct};

const OWNER: &str = "owner-demo";
const CASHIER: &str = "cashier-demo";
const WAITER: &str = "waiter-demo";

/// (name, sale price, cost price, opening stock)
const MENU: &[(&str, i64, i64, i64)] = &[
    ("Flag 65cl", 1000, 650, 48),
    ("Castel 65cl", 1000, 700, 48),
    ("Guinness 33cl", 1000, 600, 24),
    ("Coca-Cola 33cl", 500, 300, 36),
    ("Eau minérale 1.5L", 500, 250, 24),
    ("Poisson braisé", 3500, 2000, 10),
    ("Poulet braisé", 4000, 2500, 8),
    ("Alloco", 1000, 400, 20),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-d" | "--db" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "-h" | "--help" => {
                println!("MaquisPro Demo Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: from engine.toml)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = EngineConfig::load(None)?;
    if let Some(path) = db_path {
        config.database.path = Some(path);
    }

    println!("MaquisPro Demo Seeder");
    println!("=====================");
    println!("Database: {}", config.database_path().display());
    println!();

    if let Some(parent) = config.database_path().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let engine = Engine::connect(config).await?;
    let currency = engine.config().currency.clone();

    // Bar and staff
    let bar = engine
        .tenants()
        .create(
            OWNER,
            NewBar {
                name: "Maquis Chez Tantie".to_string(),
                address: Some("Rue des Jardins, Cocody".to_string()),
                ..Default::default()
            },
        )
        .await?;
    println!("✓ Bar created: {} (code {})", bar.name, bar.invitation_code);

    engine.invitations().redeem(&bar.invitation_code, CASHIER).await?;
    engine.invitations().redeem(&bar.invitation_code, WAITER).await?;
    engine
        .tenants()
        .change_member_role(&bar.id, OWNER, CASHIER, Role::Cashier)
        .await?;
    println!("✓ Staff joined: {} (cashier), {} (waiter)", CASHIER, WAITER);

    // Menu
    let mut products = Vec::with_capacity(MENU.len());
    for (name, sale, cost, stock) in MENU {
        let product = engine
            .inventory()
            .create_product(
                &bar.id,
                OWNER,
                NewProduct::new(*name, *sale, *cost).initial_stock(*stock),
            )
            .await?;
        products.push(product);
    }
    println!("✓ Menu: {} products", products.len());

    // One evening
    let register = engine.registers().open(&bar.id, CASHIER, 5000, None).await?;

    let order = engine
        .orders()
        .create(
            &bar.id,
            WAITER,
            NewOrder::new(vec![
                OrderLine::new(&products[0].id, 2),
                OrderLine::new(&products[5].id, 1),
            ])
            .table("T4"),
        )
        .await?;
    for _ in 0..3 {
        engine.orders().advance(&order.id, WAITER).await?;
    }
    engine
        .orders()
        .record_payment(&order.id, order.total, PaymentMethod::Cash, CASHIER)
        .await?;
    let order = engine.orders().advance(&order.id, CASHIER).await?;
    println!(
        "✓ Order {} {}: {}",
        order.table_number.as_deref().unwrap_or("-"),
        order.status,
        currency.format(order.total)
    );

    let summary = engine.dashboard().register_summary(&register.id, CASHIER).await?;
    let closed = engine
        .registers()
        .close(&register.id, CASHIER, summary.expected_amount, Some("Demo evening"))
        .await?;
    println!(
        "✓ Drawer closed: expected {}, variance {}",
        currency.format(closed.expected_amount.unwrap_or_default()),
        currency.format(closed.variance.unwrap_or_default())
    );

    let stats = engine.dashboard().stats(&bar.id, OWNER, None).await?;
    println!();
    println!("Dashboard:");
    println!("{}", serde_json::to_string_pretty(&stats)?);

    engine.database().close().await;
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,maquis=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();
}
