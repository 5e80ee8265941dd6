use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use larder_core::{IngredientId, OrganizationId, ProductId, RestaurantId};
use larder_inventory::{Ingredient, Unit};
use larder_planning::{ForecastMethod, PlannedStaffing};
use larder_products::{Product, Recipe};
use larder_sales::NewSale;

// -------------------------
// Catalog
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateRestaurantRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub default_shrink_pct: Option<f64>,
}

/// Insert when `id` is absent, replace otherwise.
#[derive(Debug, Deserialize)]
pub struct UpsertIngredientRequest {
    pub id: Option<Uuid>,
    pub name: String,
    pub unit: Unit,
    pub cost_per_unit: f64,
    pub pack_size: Option<f64>,
    pub supplier: Option<String>,
}

impl UpsertIngredientRequest {
    pub fn into_ingredient(self, organization_id: OrganizationId) -> Ingredient {
        Ingredient {
            id: self.id.map(IngredientId::from_uuid).unwrap_or_default(),
            organization_id,
            name: self.name,
            unit: self.unit,
            cost_per_unit: self.cost_per_unit,
            pack_size: self.pack_size,
            supplier: self.supplier,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpsertProductRequest {
    pub id: Option<Uuid>,
    pub name: String,
    pub category: String,
    pub unit_price: f64,
    #[serde(default)]
    pub recipe: Recipe,
}

impl UpsertProductRequest {
    pub fn into_product(self, organization_id: OrganizationId) -> Product {
        Product {
            id: self.id.map(ProductId::from_uuid).unwrap_or_default(),
            organization_id,
            name: self.name,
            category: self.category,
            unit_price: self.unit_price,
            recipe: self.recipe,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlanStaffingRequest {
    pub plan_date: NaiveDate,
    pub slot_label: String,
    pub planned_count: u32,
}

impl PlanStaffingRequest {
    pub fn into_planned(self, restaurant_id: RestaurantId) -> PlannedStaffing {
        PlannedStaffing {
            restaurant_id,
            plan_date: self.plan_date,
            slot_label: self.slot_label,
            planned_count: self.planned_count,
        }
    }
}

// -------------------------
// Inventory
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateRecordRequest {
    pub ingredient_id: Uuid,
    pub current_stock: f64,
    pub min_threshold: f64,
    pub max_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: f64,
}

#[derive(Debug, Deserialize)]
pub struct ThresholdsRequest {
    pub min_threshold: f64,
    pub max_threshold: Option<f64>,
}

// -------------------------
// Sales
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RecordSaleRequest {
    pub product_id: Uuid,
    pub quantity: u32,
    pub amount: f64,
    pub sale_date: NaiveDate,
    pub sale_hour: u8,
}

impl RecordSaleRequest {
    pub fn into_new_sale(self, restaurant_id: RestaurantId) -> NewSale {
        NewSale {
            restaurant_id,
            product_id: ProductId::from_uuid(self.product_id),
            quantity: self.quantity,
            amount: self.amount,
            sale_date: self.sale_date,
            sale_hour: self.sale_hour,
        }
    }
}

// -------------------------
// Planning
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RunForecastRequest {
    pub product_id: Uuid,
    pub date: NaiveDate,
    #[serde(default = "default_method")]
    pub method: ForecastMethod,
}

fn default_method() -> ForecastMethod {
    ForecastMethod::MovingAverage
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderRequest {
    pub shrink_pct: Option<f64>,
    pub horizon_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StaffingRequest {
    pub target_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    #[serde(default)]
    pub include_resolved: bool,
}
