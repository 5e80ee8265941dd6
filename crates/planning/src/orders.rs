//! BOM-driven purchase order recommendations.
//!
//! Each ingredient is sized independently: projected product demand is
//! expanded through recipes, padded with a shrink margin, netted against
//! current stock and rounded up to whole supplier packs.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use larder_core::{IngredientId, OrganizationId, RestaurantId};
use larder_inventory::{Ingredient, Unit};
use larder_products::Product;

use crate::{PlanningError, PlanningJob, Priority};

/// Upper bound on the estimated savings of one recommendation.
pub const SAVINGS_CEILING: f64 = 10_000.0;

const TRAILING_DAYS: f64 = 14.0;
const WASTE_AVOIDANCE_SHARE: f64 = 0.30;
const STOCKOUT_AVOIDANCE_SHARE: f64 = 0.20;
const ASSUMED_MARGIN: f64 = 0.60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandSource {
    Forecast,
    TrailingAverage,
}

/// Demand inputs for one product.
#[derive(Debug, Clone)]
pub struct ProductDemand {
    pub product: Product,
    /// Daily quantity of the earliest stored forecast within the horizon.
    pub forecast_daily: Option<u32>,
    /// Units sold over the 14 days before the computation day.
    pub trailing_quantity: f64,
}

impl ProductDemand {
    /// Units expected to sell over `horizon_days`.
    pub fn projected(&self, horizon_days: u32) -> (u64, DemandSource) {
        match self.forecast_daily {
            Some(daily) => (u64::from(daily) * u64::from(horizon_days), DemandSource::Forecast),
            None => {
                let per_day = self.trailing_quantity.max(0.0) / TRAILING_DAYS;
                (
                    (per_day * f64::from(horizon_days)).ceil() as u64,
                    DemandSource::TrailingAverage,
                )
            }
        }
    }
}

/// One ingredient to order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub ingredient_id: IngredientId,
    pub ingredient_name: String,
    pub unit: Unit,
    pub need: f64,
    pub need_with_shrink: f64,
    pub current_stock: f64,
    pub to_order: f64,
    pub pack_size: Option<f64>,
    pub packs: Option<u64>,
    pub supplier: Option<String>,
    pub cost_per_unit: f64,
    pub estimated_cost: f64,
}

/// Payload of an ORDER recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub horizon_days: u32,
    pub shrink_pct: f64,
    pub lines: Vec<OrderLine>,
    pub estimated_savings: f64,
}

impl OrderDetails {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// High when some line's stock does not even cover the raw need.
    pub fn priority(&self) -> Priority {
        if self.lines.iter().any(|l| l.current_stock < l.need) {
            Priority::High
        } else {
            Priority::Medium
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.lines.iter().map(|l| l.estimated_cost).sum()
    }
}

/// Order recommendation for one restaurant.
#[derive(Debug, Clone)]
pub struct OrderJob {
    pub organization_id: OrganizationId,
    pub restaurant_id: RestaurantId,
    pub today: NaiveDate,
    pub shrink_pct: f64,
    pub horizon_days: u32,
    pub demand: Vec<ProductDemand>,
    pub ingredients: HashMap<IngredientId, Ingredient>,
    /// Current stock of tracked ingredients; untracked ones count as zero.
    pub stock: HashMap<IngredientId, f64>,
}

impl OrderJob {
    fn validate(&self) -> Result<(), PlanningError> {
        if !(0.0..=1.0).contains(&self.shrink_pct) {
            return Err(PlanningError::invalid("shrink_pct must be within 0..=1"));
        }
        if self.horizon_days == 0 {
            return Err(PlanningError::invalid("horizon_days must be at least 1"));
        }
        Ok(())
    }

    /// Per-ingredient need over the horizon, summed across products.
    fn ingredient_needs(&self) -> Result<BTreeMap<IngredientId, f64>, PlanningError> {
        let mut needs: BTreeMap<IngredientId, f64> = BTreeMap::new();
        for demand in &self.demand {
            let (units, _) = demand.projected(self.horizon_days);
            if units == 0 {
                continue;
            }
            let used = demand
                .product
                .recipe
                .consumption(units as f64, |id| self.ingredients.get(&id).map(|i| i.unit))?;
            for (ingredient_id, amount) in used {
                *needs.entry(ingredient_id).or_insert(0.0) += amount;
            }
        }
        Ok(needs)
    }
}

fn round_cents(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

impl PlanningJob for OrderJob {
    type Output = OrderDetails;

    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    fn restaurant_id(&self) -> RestaurantId {
        self.restaurant_id
    }

    fn run(&self) -> Result<OrderDetails, PlanningError> {
        self.validate()?;

        let mut lines = Vec::new();
        let mut savings = 0.0;

        for (ingredient_id, need) in self.ingredient_needs()? {
            let Some(ingredient) = self.ingredients.get(&ingredient_id) else {
                continue;
            };
            let current_stock = self.stock.get(&ingredient_id).copied().unwrap_or(0.0);
            let need_with_shrink = need * (1.0 + self.shrink_pct);
            let shortfall = (need_with_shrink - current_stock).max(0.0);
            let (to_order, packs) = ingredient.round_to_packs(shortfall);

            if current_stock > 2.0 * to_order {
                savings += WASTE_AVOIDANCE_SHARE
                    * (current_stock - to_order)
                    * ingredient.cost_per_unit;
            }
            let estimated_cost = to_order * ingredient.cost_per_unit;
            savings += STOCKOUT_AVOIDANCE_SHARE * ASSUMED_MARGIN * estimated_cost;

            if to_order <= 0.0 {
                continue;
            }
            lines.push(OrderLine {
                ingredient_id,
                ingredient_name: ingredient.name.clone(),
                unit: ingredient.unit,
                need,
                need_with_shrink,
                current_stock,
                to_order,
                pack_size: ingredient.pack_size,
                packs,
                supplier: ingredient.supplier.clone(),
                cost_per_unit: ingredient.cost_per_unit,
                estimated_cost,
            });
        }

        lines.sort_by(|a, b| {
            a.ingredient_name
                .cmp(&b.ingredient_name)
                .then(a.ingredient_id.cmp(&b.ingredient_id))
        });

        Ok(OrderDetails {
            period_start: self.today,
            period_end: self.today + Duration::days(i64::from(self.horizon_days)),
            horizon_days: self.horizon_days,
            shrink_pct: self.shrink_pct,
            lines,
            estimated_savings: round_cents(savings.min(SAVINGS_CEILING)),
        })
    }
}
