//! Storage seams.
//!
//! Traits are synchronous, like the rest of the core; the Postgres backend
//! bridges onto the ambient tokio runtime. Services are generic over
//! [`CoreStore`] and never reach a backend directly.

pub mod in_memory;
pub mod postgres;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{
    AlertId, IngredientId, OrganizationId, ProductId, RecommendationId, RestaurantId, SaleId,
};
use larder_inventory::{Ingredient, InventoryRecord};
use larder_planning::{
    Alert, Forecast, PlannedStaffing, Recommendation, RecommendationStatus, RecommendationType,
};
use larder_products::Product;
use larder_sales::Sale;

use crate::error::StoreResult;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// A site owned by an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub organization_id: OrganizationId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationSettings {
    pub organization_id: OrganizationId,
    /// Shrink fraction within `0..=1`.
    pub default_shrink_pct: Option<f64>,
}

/// Organization-scoped reference data, maintained by collaborators.
pub trait CatalogStore: Send + Sync {
    fn upsert_restaurant(&self, restaurant: Restaurant) -> StoreResult<()>;
    fn restaurant(&self, id: RestaurantId) -> StoreResult<Option<Restaurant>>;
    fn restaurants(&self, organization_id: OrganizationId) -> StoreResult<Vec<Restaurant>>;
    fn all_restaurants(&self) -> StoreResult<Vec<Restaurant>>;

    fn upsert_settings(&self, settings: OrganizationSettings) -> StoreResult<()>;
    fn settings(&self, organization_id: OrganizationId) -> StoreResult<Option<OrganizationSettings>>;

    fn upsert_product(&self, product: Product) -> StoreResult<()>;
    fn product(&self, id: ProductId) -> StoreResult<Option<Product>>;
    fn products(&self, organization_id: OrganizationId) -> StoreResult<Vec<Product>>;

    fn upsert_ingredient(&self, ingredient: Ingredient) -> StoreResult<()>;
    fn ingredient(&self, id: IngredientId) -> StoreResult<Option<Ingredient>>;
    fn ingredients(&self, organization_id: OrganizationId) -> StoreResult<Vec<Ingredient>>;

    fn upsert_planned_staffing(&self, planned: PlannedStaffing) -> StoreResult<()>;
    /// Planned rows with `from <= plan_date <= to`.
    fn planned_staffing(
        &self,
        restaurant_id: RestaurantId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<PlannedStaffing>>;
}

/// Inventory record lifecycle outside of stock movements.
///
/// Stock itself only changes inside a [`LedgerStore::transaction`].
pub trait InventoryStore: Send + Sync {
    /// Start tracking an ingredient at a restaurant. `Conflict` if already tracked.
    fn create_inventory_record(&self, record: InventoryRecord) -> StoreResult<()>;

    /// `NotFound` if the ingredient is not tracked at the restaurant.
    fn set_thresholds(
        &self,
        restaurant_id: RestaurantId,
        ingredient_id: IngredientId,
        min_threshold: f64,
        max_threshold: Option<f64>,
    ) -> StoreResult<InventoryRecord>;

    fn inventory_records(&self, restaurant_id: RestaurantId) -> StoreResult<Vec<InventoryRecord>>;
}

/// Operations available inside a ledger transaction.
///
/// Reads lock the returned rows until the transaction ends.
pub trait LedgerTx {
    fn inventory_record(
        &mut self,
        restaurant_id: RestaurantId,
        ingredient_id: IngredientId,
    ) -> StoreResult<Option<InventoryRecord>>;
    fn save_inventory_record(&mut self, record: &InventoryRecord) -> StoreResult<()>;

    fn sale(&mut self, id: SaleId) -> StoreResult<Option<Sale>>;
    fn insert_sale(&mut self, sale: &Sale) -> StoreResult<()>;
    fn update_sale(&mut self, sale: &Sale) -> StoreResult<()>;
    fn delete_sale(&mut self, id: SaleId) -> StoreResult<()>;

    /// Catalog read on the transaction's own connection; does not lock.
    fn product(&mut self, id: ProductId) -> StoreResult<Option<Product>>;

    fn recommendation(&mut self, id: RecommendationId) -> StoreResult<Option<Recommendation>>;
    fn update_recommendation_status(
        &mut self,
        id: RecommendationId,
        status: RecommendationStatus,
    ) -> StoreResult<()>;
}

pub trait LedgerStore: Send + Sync {
    /// Run `f` atomically: every write it makes commits together on `Ok`
    /// and none of them is observable on `Err`.
    fn transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<R, E>,
        E: From<crate::error::StoreError>;
}

pub trait SalesStore: Send + Sync {
    fn sale(&self, id: SaleId) -> StoreResult<Option<Sale>>;
    /// Sales of a restaurant with `from <= sale_date < to`.
    fn sales_between(
        &self,
        restaurant_id: RestaurantId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Sale>>;
}

pub trait ForecastStore: Send + Sync {
    /// Insert or overwrite the forecast for its (restaurant, product, day).
    ///
    /// An overwrite keeps the stored id. Returns the stored row.
    fn upsert_forecast(&self, forecast: Forecast) -> StoreResult<Forecast>;
    fn forecast(
        &self,
        restaurant_id: RestaurantId,
        product_id: ProductId,
        date: NaiveDate,
    ) -> StoreResult<Option<Forecast>>;
    /// Forecasts with `from <= forecast_date <= to`, ordered by date.
    fn forecasts_between(
        &self,
        restaurant_id: RestaurantId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Forecast>>;
}

pub trait RecommendationStore: Send + Sync {
    fn insert_recommendation(&self, recommendation: &Recommendation) -> StoreResult<()>;
    fn recommendation(&self, id: RecommendationId) -> StoreResult<Option<Recommendation>>;
    /// Newest first.
    fn recommendations(&self, restaurant_id: RestaurantId) -> StoreResult<Vec<Recommendation>>;
    fn latest_recommendation(
        &self,
        restaurant_id: RestaurantId,
        kind: RecommendationType,
    ) -> StoreResult<Option<Recommendation>>;
}

pub trait AlertStore: Send + Sync {
    /// Atomically delete the restaurant's unresolved alerts and insert `alerts`.
    fn replace_unresolved_alerts(
        &self,
        restaurant_id: RestaurantId,
        alerts: Vec<Alert>,
    ) -> StoreResult<()>;
    /// Newest first.
    fn alerts(&self, restaurant_id: RestaurantId, include_resolved: bool) -> StoreResult<Vec<Alert>>;
    fn alert(&self, id: AlertId) -> StoreResult<Option<Alert>>;
    /// `NotFound` for an unknown id, `Conflict` if already resolved.
    fn resolve_alert(&self, id: AlertId, at: DateTime<Utc>) -> StoreResult<Alert>;
}

/// Everything the services need from one backend.
pub trait CoreStore:
    CatalogStore
    + InventoryStore
    + LedgerStore
    + SalesStore
    + ForecastStore
    + RecommendationStore
    + AlertStore
    + 'static
{
}

impl<T> CoreStore for T where
    T: CatalogStore
        + InventoryStore
        + LedgerStore
        + SalesStore
        + ForecastStore
        + RecommendationStore
        + AlertStore
        + 'static
{
}
