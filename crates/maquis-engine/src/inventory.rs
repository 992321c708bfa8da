//! # Inventory Ledger
//!
//! The menu of each bar and every change to its stock.
//!
//! ## Stock Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_movement(product, type, quantity)                              │
//! │                                                                         │
//! │  in          +quantity      (quantity > 0)                             │
//! │  out         -quantity      (quantity > 0)                             │
//! │  adjustment  ±quantity      (quantity != 0)                            │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │    UPDATE products ... WHERE stock_quantity + delta >= 0   ─┐          │
//! │    INSERT INTO inventory_movements ...                      │ one tx   │
//! │  COMMIT                                                    ─┘          │
//! │                                                                         │
//! │  Guard rejects → INSUFFICIENT_STOCK, nothing written.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The low-stock threshold only feeds the dashboard; it never blocks a
//! movement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use maquis_core::validation::{validate_amount, validate_name, validate_optional_text};
use maquis_core::{
    CoreError, InventoryMovement, MovementType, Operation, Product, ValidationError,
};
use maquis_db::Database;

use crate::access;
use crate::error::{EngineError, EngineResult};
use crate::Engine;

/// Most movements returned by [`InventoryService::movements`].
const MOVEMENT_PAGE: i64 = 200;

/// Input for [`InventoryService::create_product`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub sale_price: i64,
    pub cost_price: i64,
    /// Recorded as an `in` movement when positive.
    #[serde(default)]
    pub initial_stock: i64,
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,
    #[serde(default = "default_unit")]
    pub unit: String,
}

fn default_low_stock_threshold() -> i64 {
    5
}

fn default_unit() -> String {
    "bouteille".to_string()
}

impl NewProduct {
    pub fn new(name: impl Into<String>, sale_price: i64, cost_price: i64) -> Self {
        NewProduct {
            name: name.into(),
            description: None,
            sale_price,
            cost_price,
            initial_stock: 0,
            low_stock_threshold: default_low_stock_threshold(),
            unit: default_unit(),
        }
    }

    pub fn initial_stock(mut self, quantity: i64) -> Self {
        self.initial_stock = quantity;
        self
    }

    pub fn low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }
}

/// Catalogue edits. `None` keeps a field. Stock is never edited here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sale_price: Option<i64>,
    pub cost_price: Option<i64>,
    pub low_stock_threshold: Option<i64>,
    pub unit: Option<String>,
    pub is_active: Option<bool>,
}

/// Input for [`InventoryService::record_movement`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewMovement {
    pub movement_type: MovementType,
    /// Positive for `in`/`out`; signed for `adjustment`.
    pub quantity: i64,
    pub reason: Option<String>,
    pub reference_id: Option<String>,
}

/// A committed stock change and the product after it.
#[derive(Debug, Clone, Serialize)]
pub struct StockUpdate {
    pub product: Product,
    pub movement: InventoryMovement,
}

pub struct InventoryService<'a> {
    engine: &'a Engine,
}

impl<'a> InventoryService<'a> {
    pub(crate) fn new(engine: &'a Engine) -> Self {
        InventoryService { engine }
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn create_product(
        &self,
        bar_id: &str,
        actor_id: &str,
        input: NewProduct,
    ) -> EngineResult<Product> {
        access::authorize(&self.engine.db, bar_id, actor_id, Operation::ManageProducts).await?;

        validate_amount("sale_price", input.sale_price)?;
        validate_amount("cost_price", input.cost_price)?;
        validate_amount("initial_stock", input.initial_stock)?;
        validate_amount("low_stock_threshold", input.low_stock_threshold)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            bar_id: bar_id.to_string(),
            name: validate_name("name", &input.name)?,
            description: validate_optional_text("description", input.description.as_deref())?,
            sale_price: input.sale_price,
            cost_price: input.cost_price,
            stock_quantity: 0,
            low_stock_threshold: input.low_stock_threshold,
            unit: validate_name("unit", &input.unit)?,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        warn_if_below_cost(&product);

        let db = &self.engine.db;
        let mut tx = db.begin().await?;
        db.products().insert(&mut *tx, &product).await?;

        let product = if input.initial_stock > 0 {
            let movement = MovementRequest {
                bar_id,
                product_id: &product.id,
                movement_type: MovementType::In,
                quantity: input.initial_stock,
                reason: Some("Stock initial"),
                reference_id: None,
                actor_id: Some(actor_id),
            };
            apply_movement(db, &mut tx, &movement, now).await?.product
        } else {
            product
        };
        tx.commit().await.map_err(maquis_db::DbError::from)?;

        info!(product_id = %product.id, bar_id = %bar_id, name = %product.name, "Product created");
        Ok(product)
    }

    pub async fn update_product(
        &self,
        product_id: &str,
        actor_id: &str,
        changes: ProductUpdate,
    ) -> EngineResult<Product> {
        let mut product = self.find_product(product_id).await?;
        access::authorize(&self.engine.db, &product.bar_id, actor_id, Operation::ManageProducts)
            .await?;

        if let Some(name) = &changes.name {
            product.name = validate_name("name", name)?;
        }
        if let Some(description) = &changes.description {
            product.description = validate_optional_text("description", Some(description.as_str()))?;
        }
        if let Some(price) = changes.sale_price {
            validate_amount("sale_price", price)?;
            product.sale_price = price;
        }
        if let Some(cost) = changes.cost_price {
            validate_amount("cost_price", cost)?;
            product.cost_price = cost;
        }
        if let Some(threshold) = changes.low_stock_threshold {
            validate_amount("low_stock_threshold", threshold)?;
            product.low_stock_threshold = threshold;
        }
        if let Some(unit) = &changes.unit {
            product.unit = validate_name("unit", unit)?;
        }
        if let Some(active) = changes.is_active {
            product.is_active = active;
        }
        product.updated_at = Utc::now();
        warn_if_below_cost(&product);

        let db = &self.engine.db;
        let updated = db
            .products()
            .update(db.pool(), &product)
            .await?
            .ok_or_else(|| EngineError::not_found("Product", product_id))?;

        info!(product_id = %updated.id, "Product updated");
        Ok(updated)
    }

    /// Takes a product off the menu. Its history stays.
    pub async fn deactivate_product(&self, product_id: &str, actor_id: &str) -> EngineResult<Product> {
        let changes = ProductUpdate {
            is_active: Some(false),
            ..Default::default()
        };
        self.update_product(product_id, actor_id, changes).await
    }

    pub async fn list_products(
        &self,
        bar_id: &str,
        actor_id: &str,
        include_inactive: bool,
    ) -> EngineResult<Vec<Product>> {
        let ctx = access::authorize(&self.engine.db, bar_id, actor_id, Operation::ViewOrders).await?;
        // Only the people managing the menu see what was taken off it.
        let include_inactive =
            include_inactive && Operation::ManageProducts.is_allowed(ctx.role);

        Ok(self
            .engine
            .db
            .products()
            .list_for_bar(bar_id, include_inactive)
            .await?)
    }

    pub async fn low_stock(&self, bar_id: &str, actor_id: &str) -> EngineResult<Vec<Product>> {
        access::authorize(&self.engine.db, bar_id, actor_id, Operation::ViewDashboard).await?;
        Ok(self.engine.db.products().list_low_stock(bar_id).await?)
    }

    // =========================================================================
    // Movements
    // =========================================================================

    /// Applies a manual stock change (delivery, breakage, count correction).
    pub async fn record_movement(
        &self,
        product_id: &str,
        actor_id: &str,
        input: NewMovement,
    ) -> EngineResult<StockUpdate> {
        let input = &input;
        self.engine
            .retry
            .run("record_movement", move || {
                self.record_movement_once(product_id, actor_id, input)
            })
            .await
    }

    async fn record_movement_once(
        &self,
        product_id: &str,
        actor_id: &str,
        input: &NewMovement,
    ) -> EngineResult<StockUpdate> {
        let product = self.find_product(product_id).await?;
        access::authorize(&self.engine.db, &product.bar_id, actor_id, Operation::RecordMovement)
            .await?;

        let reason = validate_optional_text("reason", input.reason.as_deref())?;
        let request = MovementRequest {
            bar_id: &product.bar_id,
            product_id,
            movement_type: input.movement_type,
            quantity: input.quantity,
            reason: reason.as_deref(),
            reference_id: input.reference_id.as_deref(),
            actor_id: Some(actor_id),
        };

        let db = &self.engine.db;
        let mut tx = db.begin().await?;
        let update = apply_movement(db, &mut tx, &request, Utc::now()).await?;
        tx.commit().await.map_err(maquis_db::DbError::from)?;

        info!(
            product_id = %product_id,
            movement_type = input.movement_type.as_str(),
            delta = update.movement.quantity,
            stock = update.product.stock_quantity,
            "Stock movement recorded"
        );
        Ok(update)
    }

    /// Latest movements of a product, newest first.
    pub async fn movements(
        &self,
        product_id: &str,
        actor_id: &str,
    ) -> EngineResult<Vec<InventoryMovement>> {
        let product = self.find_product(product_id).await?;
        access::authorize(&self.engine.db, &product.bar_id, actor_id, Operation::RecordMovement)
            .await?;

        Ok(self
            .engine
            .db
            .inventory()
            .list_for_product(product_id, MOVEMENT_PAGE)
            .await?)
    }

    async fn find_product(&self, product_id: &str) -> EngineResult<Product> {
        let db = &self.engine.db;
        db.products()
            .find_by_id(db.pool(), product_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Product", product_id))
    }
}

fn warn_if_below_cost(product: &Product) {
    if product.sells_below_cost() {
        warn!(
            product_id = %product.id,
            sale_price = product.sale_price,
            cost_price = product.cost_price,
            "Product sells below cost"
        );
    }
}

// =============================================================================
// Shared Movement Write
// =============================================================================

/// One stock change to apply inside a caller's transaction.
pub(crate) struct MovementRequest<'r> {
    pub bar_id: &'r str,
    pub product_id: &'r str,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reason: Option<&'r str>,
    pub reference_id: Option<&'r str>,
    pub actor_id: Option<&'r str>,
}

/// Guarded stock update plus its ledger row, on `conn`.
///
/// The caller owns the transaction: on error nothing it wrote so far should
/// be committed.
pub(crate) async fn apply_movement(
    db: &Database,
    conn: &mut SqliteConnection,
    request: &MovementRequest<'_>,
    now: DateTime<Utc>,
) -> EngineResult<StockUpdate> {
    let delta = request
        .movement_type
        .signed_delta(request.quantity)
        .ok_or_else(|| invalid_quantity(request.movement_type))?;

    let product = match db
        .products()
        .adjust_stock(&mut *conn, request.product_id, delta, now)
        .await?
    {
        Some(product) => product,
        None => {
            let current = db
                .products()
                .find_by_id(&mut *conn, request.product_id)
                .await?
                .ok_or_else(|| EngineError::not_found("Product", request.product_id))?;
            return Err(CoreError::InsufficientStock {
                product: current.name,
                available: current.stock_quantity,
                requested: -delta,
            }
            .into());
        }
    };

    let movement = InventoryMovement {
        id: Uuid::new_v4().to_string(),
        bar_id: request.bar_id.to_string(),
        product_id: request.product_id.to_string(),
        movement_type: request.movement_type,
        quantity: delta,
        reason: request.reason.map(str::to_string),
        reference_id: request.reference_id.map(str::to_string),
        created_by: request.actor_id.map(str::to_string),
        created_at: now,
    };
    db.inventory().insert(&mut *conn, &movement).await?;

    Ok(StockUpdate { product, movement })
}

fn invalid_quantity(movement_type: MovementType) -> ValidationError {
    match movement_type {
        MovementType::Adjustment => ValidationError::InvalidFormat {
            field: "quantity".to_string(),
            reason: "an adjustment cannot be zero".to_string(),
        },
        _ => ValidationError::must_be_positive("quantity"),
    }
}
