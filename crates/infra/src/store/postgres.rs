//! Postgres-backed store.
//!
//! Implements every store trait against the schema in
//! `migrations/0001_core.sql`. The traits are synchronous; each call runs on
//! a tokio runtime through `Handle::block_on`: the one current when the store
//! was built, else the caller's. Callers inside async code must go through
//! `spawn_blocking`; plain threads (workers, the scheduler) can call directly
//! when the store was built inside a runtime.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any other | `Backend` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Backend` |
//!
//! ## Locking
//!
//! Ledger transactions read inventory and sale rows with `FOR UPDATE`, so
//! concurrent sales against the same (restaurant, ingredient) serialize
//! instead of losing updates.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::runtime::Handle;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use larder_core::{
    AlertId, ForecastId, IngredientId, OrganizationId, ProductId, RecommendationId, RestaurantId,
    SaleId,
};
use larder_inventory::{Ingredient, InventoryRecord, Unit};
use larder_planning::{
    Alert, AlertType, Forecast, ForecastMethod, PlannedStaffing, Priority, Recommendation,
    RecommendationData, RecommendationStatus, RecommendationType, Severity,
};
use larder_products::{Product, Recipe};
use larder_sales::Sale;

use super::{
    AlertStore, CatalogStore, ForecastStore, InventoryStore, LedgerStore, LedgerTx,
    OrganizationSettings, RecommendationStore, Restaurant, SalesStore,
};
use crate::error::{StoreError, StoreResult};

const SCHEMA: &str = include_str!("../../migrations/0001_core.sql");

const RECORD_COLUMNS: &str =
    "restaurant_id, ingredient_id, current_stock, min_threshold, max_threshold, last_updated";
const SALE_COLUMNS: &str =
    "id, organization_id, restaurant_id, product_id, quantity, amount, sale_date, sale_hour";
const FORECAST_COLUMNS: &str = "id, restaurant_id, product_id, forecast_date, forecasted_quantity, method, confidence, generated_at";
const RECOMMENDATION_COLUMNS: &str = "id, restaurant_id, payload, priority, status, created_at";
const ALERT_COLUMNS: &str =
    "id, restaurant_id, alert_type, severity, message, resolved, created_at, resolved_at";
const PRODUCT_COLUMNS: &str = "id, organization_id, name, category, unit_price, recipe";
const INGREDIENT_COLUMNS: &str =
    "id, organization_id, name, unit, cost_per_unit, pack_size, supplier";

/// Postgres-backed implementation of every store trait.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
    handle: Option<Handle>,
}

impl PostgresStore {
    /// Wrap `pool`, remembering the current runtime if there is one.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            handle: Handle::try_current().ok(),
        }
    }

    fn handle(&self) -> StoreResult<Handle> {
        match &self.handle {
            Some(h) => Ok(h.clone()),
            None => runtime(),
        }
    }

    /// Apply the schema. Statements are idempotent.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    fn block_on<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        self.handle()?.block_on(fut)
    }
}

fn runtime() -> StoreResult<Handle> {
    Handle::try_current().map_err(|_| {
        StoreError::Runtime(
            "PostgresStore requires a tokio runtime; call it from within one (e.g. spawn_blocking)"
                .to_string(),
        )
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("row not found in {operation}")),
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Backend(format!("failed to read column {name}: {e}")))
}

fn bad_value(what: &str, value: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("unexpected {what} value in database: {value}"))
}

fn restaurant_from_row(row: &PgRow) -> StoreResult<Restaurant> {
    Ok(Restaurant {
        id: RestaurantId::from_uuid(col(row, "id")?),
        organization_id: OrganizationId::from_uuid(col(row, "organization_id")?),
        name: col(row, "name")?,
    })
}

fn product_from_row(row: &PgRow) -> StoreResult<Product> {
    let recipe: serde_json::Value = col(row, "recipe")?;
    let recipe: Recipe =
        serde_json::from_value(recipe).map_err(|e| bad_value("recipe", e))?;
    Ok(Product {
        id: ProductId::from_uuid(col(row, "id")?),
        organization_id: OrganizationId::from_uuid(col(row, "organization_id")?),
        name: col(row, "name")?,
        category: col(row, "category")?,
        unit_price: col(row, "unit_price")?,
        recipe,
    })
}

fn ingredient_from_row(row: &PgRow) -> StoreResult<Ingredient> {
    let unit: String = col(row, "unit")?;
    Ok(Ingredient {
        id: IngredientId::from_uuid(col(row, "id")?),
        organization_id: OrganizationId::from_uuid(col(row, "organization_id")?),
        name: col(row, "name")?,
        unit: unit.parse::<Unit>().map_err(|e| bad_value("unit", e))?,
        cost_per_unit: col(row, "cost_per_unit")?,
        pack_size: col(row, "pack_size")?,
        supplier: col(row, "supplier")?,
    })
}

fn record_from_row(row: &PgRow) -> StoreResult<InventoryRecord> {
    Ok(InventoryRecord {
        restaurant_id: RestaurantId::from_uuid(col(row, "restaurant_id")?),
        ingredient_id: IngredientId::from_uuid(col(row, "ingredient_id")?),
        current_stock: col(row, "current_stock")?,
        min_threshold: col(row, "min_threshold")?,
        max_threshold: col(row, "max_threshold")?,
        last_updated: col(row, "last_updated")?,
    })
}

fn sale_from_row(row: &PgRow) -> StoreResult<Sale> {
    let quantity: i32 = col(row, "quantity")?;
    let hour: i16 = col(row, "sale_hour")?;
    Ok(Sale {
        id: SaleId::from_uuid(col(row, "id")?),
        organization_id: OrganizationId::from_uuid(col(row, "organization_id")?),
        restaurant_id: RestaurantId::from_uuid(col(row, "restaurant_id")?),
        product_id: ProductId::from_uuid(col(row, "product_id")?),
        quantity: u32::try_from(quantity).map_err(|_| bad_value("quantity", quantity))?,
        amount: col(row, "amount")?,
        sale_date: col(row, "sale_date")?,
        sale_hour: u8::try_from(hour).map_err(|_| bad_value("sale_hour", hour))?,
    })
}

fn forecast_from_row(row: &PgRow) -> StoreResult<Forecast> {
    let quantity: i32 = col(row, "forecasted_quantity")?;
    let method: String = col(row, "method")?;
    Ok(Forecast {
        id: ForecastId::from_uuid(col(row, "id")?),
        restaurant_id: RestaurantId::from_uuid(col(row, "restaurant_id")?),
        product_id: ProductId::from_uuid(col(row, "product_id")?),
        forecast_date: col(row, "forecast_date")?,
        forecasted_quantity: u32::try_from(quantity)
            .map_err(|_| bad_value("forecasted_quantity", quantity))?,
        method: ForecastMethod::parse(&method).ok_or_else(|| bad_value("method", &method))?,
        confidence: col(row, "confidence")?,
        generated_at: col(row, "generated_at")?,
    })
}

fn recommendation_from_row(row: &PgRow) -> StoreResult<Recommendation> {
    let payload: serde_json::Value = col(row, "payload")?;
    let priority: String = col(row, "priority")?;
    let status: String = col(row, "status")?;
    Ok(Recommendation {
        id: RecommendationId::from_uuid(col(row, "id")?),
        restaurant_id: RestaurantId::from_uuid(col(row, "restaurant_id")?),
        data: serde_json::from_value::<RecommendationData>(payload)
            .map_err(|e| bad_value("recommendation payload", e))?,
        priority: Priority::parse(&priority).ok_or_else(|| bad_value("priority", &priority))?,
        status: RecommendationStatus::parse(&status).ok_or_else(|| bad_value("status", &status))?,
        created_at: col(row, "created_at")?,
    })
}

fn alert_from_row(row: &PgRow) -> StoreResult<Alert> {
    let alert_type: String = col(row, "alert_type")?;
    let severity: String = col(row, "severity")?;
    Ok(Alert {
        id: AlertId::from_uuid(col(row, "id")?),
        restaurant_id: RestaurantId::from_uuid(col(row, "restaurant_id")?),
        alert_type: AlertType::parse(&alert_type).ok_or_else(|| bad_value("alert_type", &alert_type))?,
        severity: Severity::parse(&severity).ok_or_else(|| bad_value("severity", &severity))?,
        message: col(row, "message")?,
        resolved: col(row, "resolved")?,
        created_at: col(row, "created_at")?,
        resolved_at: col(row, "resolved_at")?,
    })
}

fn planned_from_row(row: &PgRow) -> StoreResult<PlannedStaffing> {
    let count: i32 = col(row, "planned_count")?;
    Ok(PlannedStaffing {
        restaurant_id: RestaurantId::from_uuid(col(row, "restaurant_id")?),
        plan_date: col(row, "plan_date")?,
        slot_label: col(row, "slot_label")?,
        planned_count: u32::try_from(count).map_err(|_| bad_value("planned_count", count))?,
    })
}

fn collect<T>(rows: &[PgRow], f: fn(&PgRow) -> StoreResult<T>) -> StoreResult<Vec<T>> {
    rows.iter().map(f).collect()
}

fn to_i32(what: &str, value: u32) -> StoreResult<i32> {
    i32::try_from(value).map_err(|_| StoreError::Backend(format!("{what} {value} exceeds storage range")))
}

impl CatalogStore for PostgresStore {
    fn upsert_restaurant(&self, restaurant: Restaurant) -> StoreResult<()> {
        self.block_on(async {
            sqlx::query(
                r#"
                INSERT INTO restaurants (id, organization_id, name)
                VALUES ($1, $2, $3)
                ON CONFLICT (id) DO UPDATE SET
                    organization_id = EXCLUDED.organization_id,
                    name = EXCLUDED.name
                "#,
            )
            .bind(restaurant.id.as_uuid())
            .bind(restaurant.organization_id.as_uuid())
            .bind(&restaurant.name)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("upsert_restaurant", e))?;
            Ok(())
        })
    }

    fn restaurant(&self, id: RestaurantId) -> StoreResult<Option<Restaurant>> {
        self.block_on(async {
            let row = sqlx::query("SELECT id, organization_id, name FROM restaurants WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("restaurant", e))?;
            row.as_ref().map(restaurant_from_row).transpose()
        })
    }

    fn restaurants(&self, organization_id: OrganizationId) -> StoreResult<Vec<Restaurant>> {
        self.block_on(async {
            let rows = sqlx::query(
                "SELECT id, organization_id, name FROM restaurants WHERE organization_id = $1 ORDER BY id",
            )
            .bind(organization_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("restaurants", e))?;
            collect(&rows, restaurant_from_row)
        })
    }

    fn all_restaurants(&self) -> StoreResult<Vec<Restaurant>> {
        self.block_on(async {
            let rows = sqlx::query("SELECT id, organization_id, name FROM restaurants ORDER BY id")
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("all_restaurants", e))?;
            collect(&rows, restaurant_from_row)
        })
    }

    fn upsert_settings(&self, settings: OrganizationSettings) -> StoreResult<()> {
        self.block_on(async {
            sqlx::query(
                r#"
                INSERT INTO organization_settings (organization_id, default_shrink_pct)
                VALUES ($1, $2)
                ON CONFLICT (organization_id) DO UPDATE SET
                    default_shrink_pct = EXCLUDED.default_shrink_pct
                "#,
            )
            .bind(settings.organization_id.as_uuid())
            .bind(settings.default_shrink_pct)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("upsert_settings", e))?;
            Ok(())
        })
    }

    fn settings(&self, organization_id: OrganizationId) -> StoreResult<Option<OrganizationSettings>> {
        self.block_on(async {
            let row = sqlx::query(
                "SELECT organization_id, default_shrink_pct FROM organization_settings WHERE organization_id = $1",
            )
            .bind(organization_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("settings", e))?;
            row.map(|row| {
                Ok(OrganizationSettings {
                    organization_id: OrganizationId::from_uuid(col(&row, "organization_id")?),
                    default_shrink_pct: col(&row, "default_shrink_pct")?,
                })
            })
            .transpose()
        })
    }

    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    fn upsert_product(&self, product: Product) -> StoreResult<()> {
        let recipe = serde_json::to_value(&product.recipe)
            .map_err(|e| StoreError::Backend(format!("failed to serialize recipe: {e}")))?;
        self.block_on(async {
            sqlx::query(
                r#"
                INSERT INTO products (id, organization_id, name, category, unit_price, recipe)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE SET
                    name = EXCLUDED.name,
                    category = EXCLUDED.category,
                    unit_price = EXCLUDED.unit_price,
                    recipe = EXCLUDED.recipe
                "#,
            )
            .bind(product.id.as_uuid())
            .bind(product.organization_id.as_uuid())
            .bind(&product.name)
            .bind(&product.category)
            .bind(product.unit_price)
            .bind(&recipe)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("upsert_product", e))?;
            Ok(())
        })
    }

    fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        self.block_on(async {
            let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("product", e))?;
            row.as_ref().map(product_from_row).transpose()
        })
    }

    fn products(&self, organization_id: OrganizationId) -> StoreResult<Vec<Product>> {
        self.block_on(async {
            let rows = sqlx::query(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE organization_id = $1 ORDER BY id"
            ))
            .bind(organization_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("products", e))?;
            collect(&rows, product_from_row)
        })
    }

    fn upsert_ingredient(&self, ingredient: Ingredient) -> StoreResult<()> {
        self.block_on(async {
            sqlx::query(
                r#"
                INSERT INTO ingredients (id, organization_id, name, unit, cost_per_unit, pack_size, supplier)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE SET
                    name = EXCLUDED.name,
                    unit = EXCLUDED.unit,
                    cost_per_unit = EXCLUDED.cost_per_unit,
                    pack_size = EXCLUDED.pack_size,
                    supplier = EXCLUDED.supplier
                "#,
            )
            .bind(ingredient.id.as_uuid())
            .bind(ingredient.organization_id.as_uuid())
            .bind(&ingredient.name)
            .bind(ingredient.unit.as_str())
            .bind(ingredient.cost_per_unit)
            .bind(ingredient.pack_size)
            .bind(&ingredient.supplier)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("upsert_ingredient", e))?;
            Ok(())
        })
    }

    fn ingredient(&self, id: IngredientId) -> StoreResult<Option<Ingredient>> {
        self.block_on(async {
            let row = sqlx::query(&format!("SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ingredient", e))?;
            row.as_ref().map(ingredient_from_row).transpose()
        })
    }

    fn ingredients(&self, organization_id: OrganizationId) -> StoreResult<Vec<Ingredient>> {
        self.block_on(async {
            let rows = sqlx::query(&format!(
                "SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE organization_id = $1 ORDER BY id"
            ))
            .bind(organization_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ingredients", e))?;
            collect(&rows, ingredient_from_row)
        })
    }

    fn upsert_planned_staffing(&self, planned: PlannedStaffing) -> StoreResult<()> {
        let count = to_i32("planned_count", planned.planned_count)?;
        self.block_on(async {
            sqlx::query(
                r#"
                INSERT INTO planned_staffing (restaurant_id, plan_date, slot_label, planned_count)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (restaurant_id, plan_date, slot_label) DO UPDATE SET
                    planned_count = EXCLUDED.planned_count
                "#,
            )
            .bind(planned.restaurant_id.as_uuid())
            .bind(planned.plan_date)
            .bind(&planned.slot_label)
            .bind(count)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("upsert_planned_staffing", e))?;
            Ok(())
        })
    }

    fn planned_staffing(
        &self,
        restaurant_id: RestaurantId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<PlannedStaffing>> {
        self.block_on(async {
            let rows = sqlx::query(
                r#"
                SELECT restaurant_id, plan_date, slot_label, planned_count
                FROM planned_staffing
                WHERE restaurant_id = $1 AND plan_date BETWEEN $2 AND $3
                ORDER BY plan_date, slot_label
                "#,
            )
            .bind(restaurant_id.as_uuid())
            .bind(from)
            .bind(to)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("planned_staffing", e))?;
            collect(&rows, planned_from_row)
        })
    }
}

impl InventoryStore for PostgresStore {
    #[instrument(
        skip(self, record),
        fields(restaurant_id = %record.restaurant_id, ingredient_id = %record.ingredient_id),
        err
    )]
    fn create_inventory_record(&self, record: InventoryRecord) -> StoreResult<()> {
        self.block_on(async {
            sqlx::query(&format!(
                "INSERT INTO inventory_records ({RECORD_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
            ))
            .bind(record.restaurant_id.as_uuid())
            .bind(record.ingredient_id.as_uuid())
            .bind(record.current_stock)
            .bind(record.min_threshold)
            .bind(record.max_threshold)
            .bind(record.last_updated)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_inventory_record", e))?;
            Ok(())
        })
    }

    fn set_thresholds(
        &self,
        restaurant_id: RestaurantId,
        ingredient_id: IngredientId,
        min_threshold: f64,
        max_threshold: Option<f64>,
    ) -> StoreResult<InventoryRecord> {
        self.block_on(async {
            let row = sqlx::query(&format!(
                r#"
                UPDATE inventory_records SET min_threshold = $3, max_threshold = $4
                WHERE restaurant_id = $1 AND ingredient_id = $2
                RETURNING {RECORD_COLUMNS}
                "#
            ))
            .bind(restaurant_id.as_uuid())
            .bind(ingredient_id.as_uuid())
            .bind(min_threshold)
            .bind(max_threshold)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_thresholds", e))?;
            match row {
                Some(row) => record_from_row(&row),
                None => Err(StoreError::NotFound(format!(
                    "inventory record {restaurant_id}/{ingredient_id}"
                ))),
            }
        })
    }

    fn inventory_records(&self, restaurant_id: RestaurantId) -> StoreResult<Vec<InventoryRecord>> {
        self.block_on(async {
            let rows = sqlx::query(&format!(
                "SELECT {RECORD_COLUMNS} FROM inventory_records WHERE restaurant_id = $1 ORDER BY ingredient_id"
            ))
            .bind(restaurant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("inventory_records", e))?;
            collect(&rows, record_from_row)
        })
    }
}

/// Open ledger transaction. Dropped without commit means rolled back.
struct PgLedgerTx {
    handle: Handle,
    tx: Transaction<'static, Postgres>,
}

impl LedgerTx for PgLedgerTx {
    fn inventory_record(
        &mut self,
        restaurant_id: RestaurantId,
        ingredient_id: IngredientId,
    ) -> StoreResult<Option<InventoryRecord>> {
        let tx = &mut self.tx;
        let row = self.handle.block_on(async move {
            sqlx::query(&format!(
                r#"
                SELECT {RECORD_COLUMNS} FROM inventory_records
                WHERE restaurant_id = $1 AND ingredient_id = $2
                FOR UPDATE
                "#
            ))
            .bind(restaurant_id.as_uuid())
            .bind(ingredient_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("lock_inventory_record", e))
        })?;
        row.as_ref().map(record_from_row).transpose()
    }

    fn save_inventory_record(&mut self, record: &InventoryRecord) -> StoreResult<()> {
        let tx = &mut self.tx;
        let result = self.handle.block_on(async move {
            sqlx::query(
                r#"
                UPDATE inventory_records
                SET current_stock = $3, min_threshold = $4, max_threshold = $5, last_updated = $6
                WHERE restaurant_id = $1 AND ingredient_id = $2
                "#,
            )
            .bind(record.restaurant_id.as_uuid())
            .bind(record.ingredient_id.as_uuid())
            .bind(record.current_stock)
            .bind(record.min_threshold)
            .bind(record.max_threshold)
            .bind(record.last_updated)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("save_inventory_record", e))
        })?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "inventory record {}/{}",
                record.restaurant_id, record.ingredient_id
            )));
        }
        Ok(())
    }

    fn sale(&mut self, id: SaleId) -> StoreResult<Option<Sale>> {
        let tx = &mut self.tx;
        let row = self.handle.block_on(async move {
            sqlx::query(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1 FOR UPDATE"))
                .bind(id.as_uuid())
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("lock_sale", e))
        })?;
        row.as_ref().map(sale_from_row).transpose()
    }

    fn insert_sale(&mut self, sale: &Sale) -> StoreResult<()> {
        let quantity = to_i32("quantity", sale.quantity)?;
        let tx = &mut self.tx;
        self.handle.block_on(async move {
            sqlx::query(&format!(
                "INSERT INTO sales ({SALE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
            ))
            .bind(sale.id.as_uuid())
            .bind(sale.organization_id.as_uuid())
            .bind(sale.restaurant_id.as_uuid())
            .bind(sale.product_id.as_uuid())
            .bind(quantity)
            .bind(sale.amount)
            .bind(sale.sale_date)
            .bind(i16::from(sale.sale_hour))
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_sale", e))
        })?;
        Ok(())
    }

    fn update_sale(&mut self, sale: &Sale) -> StoreResult<()> {
        let quantity = to_i32("quantity", sale.quantity)?;
        let tx = &mut self.tx;
        let result = self.handle.block_on(async move {
            sqlx::query(
                r#"
                UPDATE sales
                SET restaurant_id = $2, product_id = $3, quantity = $4, sale_date = $5, sale_hour = $6
                WHERE id = $1
                "#,
            )
            .bind(sale.id.as_uuid())
            .bind(sale.restaurant_id.as_uuid())
            .bind(sale.product_id.as_uuid())
            .bind(quantity)
            .bind(sale.sale_date)
            .bind(i16::from(sale.sale_hour))
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("update_sale", e))
        })?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("sale {}", sale.id)));
        }
        Ok(())
    }

    fn delete_sale(&mut self, id: SaleId) -> StoreResult<()> {
        let tx = &mut self.tx;
        let result = self.handle.block_on(async move {
            sqlx::query("DELETE FROM sales WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("delete_sale", e))
        })?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("sale {id}")));
        }
        Ok(())
    }

    fn product(&mut self, id: ProductId) -> StoreResult<Option<Product>> {
        let tx = &mut self.tx;
        let row = self.handle.block_on(async move {
            sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("product", e))
        })?;
        row.as_ref().map(product_from_row).transpose()
    }

    fn recommendation(&mut self, id: RecommendationId) -> StoreResult<Option<Recommendation>> {
        let tx = &mut self.tx;
        let row = self.handle.block_on(async move {
            sqlx::query(&format!(
                "SELECT {RECOMMENDATION_COLUMNS} FROM recommendations WHERE id = $1 FOR UPDATE"
            ))
            .bind(id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("lock_recommendation", e))
        })?;
        row.as_ref().map(recommendation_from_row).transpose()
    }

    fn update_recommendation_status(
        &mut self,
        id: RecommendationId,
        status: RecommendationStatus,
    ) -> StoreResult<()> {
        let tx = &mut self.tx;
        let result = self.handle.block_on(async move {
            sqlx::query("UPDATE recommendations SET status = $2 WHERE id = $1")
                .bind(id.as_uuid())
                .bind(status.as_str())
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("update_recommendation_status", e))
        })?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("recommendation {id}")));
        }
        Ok(())
    }
}

impl LedgerStore for PostgresStore {
    fn transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<R, E>,
        E: From<StoreError>,
    {
        let handle = self.handle()?;
        let tx = handle
            .block_on(self.pool.begin())
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let mut ledger_tx = PgLedgerTx { handle, tx };

        match f(&mut ledger_tx) {
            Ok(out) => {
                let PgLedgerTx { handle, tx } = ledger_tx;
                handle
                    .block_on(tx.commit())
                    .map_err(|e| map_sqlx_error("commit_transaction", e))?;
                Ok(out)
            }
            Err(err) => {
                let PgLedgerTx { handle, tx } = ledger_tx;
                if let Err(rollback) = handle.block_on(tx.rollback()) {
                    warn!(error = %rollback, "ledger rollback failed; connection will be discarded");
                }
                debug!("ledger transaction rolled back");
                Err(err)
            }
        }
    }
}

impl SalesStore for PostgresStore {
    fn sale(&self, id: SaleId) -> StoreResult<Option<Sale>> {
        self.block_on(async {
            let row = sqlx::query(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("sale", e))?;
            row.as_ref().map(sale_from_row).transpose()
        })
    }

    fn sales_between(
        &self,
        restaurant_id: RestaurantId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Sale>> {
        self.block_on(async {
            let rows = sqlx::query(&format!(
                r#"
                SELECT {SALE_COLUMNS} FROM sales
                WHERE restaurant_id = $1 AND sale_date >= $2 AND sale_date < $3
                ORDER BY sale_date, sale_hour, id
                "#
            ))
            .bind(restaurant_id.as_uuid())
            .bind(from)
            .bind(to)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("sales_between", e))?;
            collect(&rows, sale_from_row)
        })
    }
}

impl ForecastStore for PostgresStore {
    #[instrument(
        skip(self, forecast),
        fields(restaurant_id = %forecast.restaurant_id, product_id = %forecast.product_id, date = %forecast.forecast_date),
        err
    )]
    fn upsert_forecast(&self, forecast: Forecast) -> StoreResult<Forecast> {
        let quantity = to_i32("forecasted_quantity", forecast.forecasted_quantity)?;
        self.block_on(async {
            let row = sqlx::query(&format!(
                r#"
                INSERT INTO forecasts ({FORECAST_COLUMNS})
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (restaurant_id, product_id, forecast_date) DO UPDATE SET
                    forecasted_quantity = EXCLUDED.forecasted_quantity,
                    method = EXCLUDED.method,
                    confidence = EXCLUDED.confidence,
                    generated_at = EXCLUDED.generated_at
                RETURNING {FORECAST_COLUMNS}
                "#
            ))
            .bind(forecast.id.as_uuid())
            .bind(forecast.restaurant_id.as_uuid())
            .bind(forecast.product_id.as_uuid())
            .bind(forecast.forecast_date)
            .bind(quantity)
            .bind(forecast.method.as_str())
            .bind(forecast.confidence)
            .bind(forecast.generated_at)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("upsert_forecast", e))?;
            forecast_from_row(&row)
        })
    }

    fn forecast(
        &self,
        restaurant_id: RestaurantId,
        product_id: ProductId,
        date: NaiveDate,
    ) -> StoreResult<Option<Forecast>> {
        self.block_on(async {
            let row = sqlx::query(&format!(
                r#"
                SELECT {FORECAST_COLUMNS} FROM forecasts
                WHERE restaurant_id = $1 AND product_id = $2 AND forecast_date = $3
                "#
            ))
            .bind(restaurant_id.as_uuid())
            .bind(product_id.as_uuid())
            .bind(date)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("forecast", e))?;
            row.as_ref().map(forecast_from_row).transpose()
        })
    }

    fn forecasts_between(
        &self,
        restaurant_id: RestaurantId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Forecast>> {
        self.block_on(async {
            let rows = sqlx::query(&format!(
                r#"
                SELECT {FORECAST_COLUMNS} FROM forecasts
                WHERE restaurant_id = $1 AND forecast_date BETWEEN $2 AND $3
                ORDER BY forecast_date, product_id
                "#
            ))
            .bind(restaurant_id.as_uuid())
            .bind(from)
            .bind(to)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("forecasts_between", e))?;
            collect(&rows, forecast_from_row)
        })
    }
}

impl RecommendationStore for PostgresStore {
    fn insert_recommendation(&self, recommendation: &Recommendation) -> StoreResult<()> {
        let payload = serde_json::to_value(&recommendation.data)
            .map_err(|e| StoreError::Backend(format!("failed to serialize recommendation: {e}")))?;
        self.block_on(async {
            sqlx::query(
                r#"
                INSERT INTO recommendations (id, restaurant_id, type, payload, priority, status, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(recommendation.id.as_uuid())
            .bind(recommendation.restaurant_id.as_uuid())
            .bind(recommendation.kind().as_str())
            .bind(&payload)
            .bind(recommendation.priority.as_str())
            .bind(recommendation.status.as_str())
            .bind(recommendation.created_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_recommendation", e))?;
            Ok(())
        })
    }

    fn recommendation(&self, id: RecommendationId) -> StoreResult<Option<Recommendation>> {
        self.block_on(async {
            let row = sqlx::query(&format!(
                "SELECT {RECOMMENDATION_COLUMNS} FROM recommendations WHERE id = $1"
            ))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("recommendation", e))?;
            row.as_ref().map(recommendation_from_row).transpose()
        })
    }

    fn recommendations(&self, restaurant_id: RestaurantId) -> StoreResult<Vec<Recommendation>> {
        self.block_on(async {
            let rows = sqlx::query(&format!(
                r#"
                SELECT {RECOMMENDATION_COLUMNS} FROM recommendations
                WHERE restaurant_id = $1
                ORDER BY created_at DESC, id DESC
                "#
            ))
            .bind(restaurant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("recommendations", e))?;
            collect(&rows, recommendation_from_row)
        })
    }

    fn latest_recommendation(
        &self,
        restaurant_id: RestaurantId,
        kind: RecommendationType,
    ) -> StoreResult<Option<Recommendation>> {
        self.block_on(async {
            let row = sqlx::query(&format!(
                r#"
                SELECT {RECOMMENDATION_COLUMNS} FROM recommendations
                WHERE restaurant_id = $1 AND type = $2
                ORDER BY created_at DESC, id DESC
                LIMIT 1
                "#
            ))
            .bind(restaurant_id.as_uuid())
            .bind(kind.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("latest_recommendation", e))?;
            row.as_ref().map(recommendation_from_row).transpose()
        })
    }
}

impl AlertStore for PostgresStore {
    #[instrument(skip(self, alerts), fields(restaurant_id = %restaurant_id, count = alerts.len()), err)]
    fn replace_unresolved_alerts(
        &self,
        restaurant_id: RestaurantId,
        alerts: Vec<Alert>,
    ) -> StoreResult<()> {
        self.block_on(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error("begin_transaction", e))?;

            // Serializes concurrent regenerations of the same restaurant: a
            // second DELETE must see the first one's inserts as committed.
            sqlx::query("SELECT 1 FROM restaurants WHERE id = $1 FOR UPDATE")
                .bind(restaurant_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("lock_restaurant_alerts", e))?;

            sqlx::query("DELETE FROM alerts WHERE restaurant_id = $1 AND NOT resolved")
                .bind(restaurant_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("delete_unresolved_alerts", e))?;

            for alert in &alerts {
                sqlx::query(&format!(
                    "INSERT INTO alerts ({ALERT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
                ))
                .bind(alert.id.as_uuid())
                .bind(alert.restaurant_id.as_uuid())
                .bind(alert.alert_type.as_str())
                .bind(alert.severity.as_str())
                .bind(&alert.message)
                .bind(alert.resolved)
                .bind(alert.created_at)
                .bind(alert.resolved_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_alert", e))?;
            }

            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit_transaction", e))?;
            Ok(())
        })
    }

    fn alerts(&self, restaurant_id: RestaurantId, include_resolved: bool) -> StoreResult<Vec<Alert>> {
        self.block_on(async {
            let rows = sqlx::query(&format!(
                r#"
                SELECT {ALERT_COLUMNS} FROM alerts
                WHERE restaurant_id = $1 AND ($2 OR NOT resolved)
                ORDER BY created_at DESC, id
                "#
            ))
            .bind(restaurant_id.as_uuid())
            .bind(include_resolved)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("alerts", e))?;
            collect(&rows, alert_from_row)
        })
    }

    fn alert(&self, id: AlertId) -> StoreResult<Option<Alert>> {
        self.block_on(async {
            let row = sqlx::query(&format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("alert", e))?;
            row.as_ref().map(alert_from_row).transpose()
        })
    }

    fn resolve_alert(&self, id: AlertId, at: DateTime<Utc>) -> StoreResult<Alert> {
        self.block_on(async {
            let row = sqlx::query(&format!(
                r#"
                UPDATE alerts SET resolved = TRUE, resolved_at = $2
                WHERE id = $1 AND NOT resolved
                RETURNING {ALERT_COLUMNS}
                "#
            ))
            .bind(id.as_uuid())
            .bind(at)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("resolve_alert", e))?;

            if let Some(row) = row {
                return alert_from_row(&row);
            }

            let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM alerts WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("resolve_alert", e))?;
            match exists {
                Some(_) => Err(StoreError::Conflict(format!("alert {id} is already resolved"))),
                None => Err(StoreError::NotFound(format!("alert {id}"))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            map_sqlx_error("sale", sqlx::Error::RowNotFound),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            map_sqlx_error("sale", sqlx::Error::PoolClosed),
            StoreError::Backend(_)
        ));
    }

    #[test]
    fn calls_outside_a_runtime_fail_cleanly() {
        assert!(matches!(runtime(), Err(StoreError::Runtime(_))));
    }

    /// Requires a running PostgreSQL database.
    /// Run with: LARDER_TEST_DATABASE_URL=postgres://... cargo test -p larder-infra -- --ignored
    #[test]
    #[ignore]
    fn concurrent_regenerations_leave_a_single_alert_set() {
        use std::sync::Barrier;
        use std::thread;

        use larder_planning::{AlertDraft, AlertType, Severity};

        let url = std::env::var("LARDER_TEST_DATABASE_URL")
            .expect("LARDER_TEST_DATABASE_URL must point at a test database");
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let store = rt.block_on(async {
            let pool = PgPool::connect(&url).await.unwrap();
            let store = PostgresStore::new(pool);
            store.migrate().await.unwrap();
            store
        });

        let restaurant = Restaurant {
            id: RestaurantId::new(),
            organization_id: OrganizationId::new(),
            name: "Batignolles".to_string(),
        };
        store.upsert_restaurant(restaurant.clone()).unwrap();

        const WRITERS: usize = 6;
        for _ in 0..20 {
            let barrier = Barrier::new(WRITERS);
            thread::scope(|scope| {
                for _ in 0..WRITERS {
                    scope.spawn(|| {
                        let alert = Alert::from_draft(
                            restaurant.id,
                            AlertDraft {
                                alert_type: AlertType::Shortage,
                                severity: Severity::High,
                                message: "Stock bas: Farine T55".to_string(),
                            },
                            Utc::now(),
                        );
                        barrier.wait();
                        store
                            .replace_unresolved_alerts(restaurant.id, vec![alert])
                            .unwrap();
                    });
                }
            });
            assert_eq!(store.alerts(restaurant.id, false).unwrap().len(), 1);
        }
    }

    #[test]
    fn schema_declares_every_table() {
        for table in [
            "restaurants",
            "organization_settings",
            "products",
            "ingredients",
            "inventory_records",
            "sales",
            "forecasts",
            "recommendations",
            "alerts",
            "planned_staffing",
        ] {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
                "missing table {table}"
            );
        }
    }
}
