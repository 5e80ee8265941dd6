//! Alert derivation.
//!
//! A regeneration pass derives the complete unresolved alert set of a
//! restaurant from current state: inventory thresholds, tomorrow's forecasted
//! consumption, and planned versus recommended staffing. Callers replace the
//! stored unresolved set with the output; resolved alerts are history and
//! never part of it.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{AlertId, DomainError, DomainResult, IngredientId, OrganizationId, RestaurantId};
use larder_inventory::{Ingredient, InventoryRecord, to_inventory_unit};
use larder_products::Product;

use crate::{
    PlannedStaffing, PlanningError, PlanningJob, SLOTS, SaleObservation, StaffingPlan,
    recommend_staffing,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    Shortage,
    Overstock,
    Overstaffing,
    Understaffing,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::Shortage => "SHORTAGE",
            AlertType::Overstock => "OVERSTOCK",
            AlertType::Overstaffing => "OVERSTAFFING",
            AlertType::Understaffing => "UNDERSTAFFING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SHORTAGE" => Some(AlertType::Shortage),
            "OVERSTOCK" => Some(AlertType::Overstock),
            "OVERSTAFFING" => Some(AlertType::Overstaffing),
            "UNDERSTAFFING" => Some(AlertType::Understaffing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Severity of a shortage from `current / min`; both bounds are exclusive.
    pub fn for_shortage_ratio(ratio: f64) -> Self {
        if ratio < 0.2 {
            Severity::Critical
        } else if ratio < 0.5 {
            Severity::High
        } else {
            Severity::Medium
        }
    }
}

/// An alert as derived by a pass, before it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDraft {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub restaurant_id: RestaurantId,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn from_draft(restaurant_id: RestaurantId, draft: AlertDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id: AlertId::new(),
            restaurant_id,
            alert_type: draft.alert_type,
            severity: draft.severity,
            message: draft.message,
            resolved: false,
            created_at,
            resolved_at: None,
        }
    }

    pub fn resolve(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.resolved {
            return Err(DomainError::conflict(format!("alert {} is already resolved", self.id)));
        }
        self.resolved = true;
        self.resolved_at = Some(now);
        Ok(())
    }
}

/// Day label relative to `today`, as shown in alert messages.
pub fn relative_day_label(today: NaiveDate, day: NaiveDate) -> String {
    match (day - today).num_days() {
        n if n <= 0 => "aujourd'hui".to_string(),
        1 => "demain".to_string(),
        n => format!("dans {n} jours"),
    }
}

fn qty(x: f64) -> String {
    if x.fract() == 0.0 {
        format!("{x:.0}")
    } else {
        format!("{x:.2}")
    }
}

fn ingredient_label(ingredients: &HashMap<IngredientId, Ingredient>, id: IngredientId) -> (String, String) {
    match ingredients.get(&id) {
        Some(i) => (i.name.clone(), i.unit.to_string()),
        None => (id.to_string(), String::new()),
    }
}

fn inventory_alerts(
    records: &[InventoryRecord],
    ingredients: &HashMap<IngredientId, Ingredient>,
) -> Vec<AlertDraft> {
    let mut out = Vec::new();
    for record in records {
        let (name, unit) = ingredient_label(ingredients, record.ingredient_id);

        if let (true, Some(max)) = (record.is_overstocked(), record.max_threshold) {
            out.push(AlertDraft {
                alert_type: AlertType::Overstock,
                severity: Severity::Medium,
                message: format!(
                    "Surstock de {name} : {} {unit} en stock (maximum {} {unit})",
                    qty(record.current_stock),
                    qty(max)
                ),
            });
        }

        if let Some(ratio) = record.shortage_ratio() {
            out.push(AlertDraft {
                alert_type: AlertType::Shortage,
                severity: Severity::for_shortage_ratio(ratio),
                message: format!(
                    "Stock bas de {name} : {} {unit} en stock (minimum {} {unit})",
                    qty(record.current_stock),
                    qty(record.min_threshold)
                ),
            });
        }
    }
    out
}

/// Inventory alerts only, computed without persisting anything.
pub fn current_alerts_state(
    records: &[InventoryRecord],
    ingredients: &HashMap<IngredientId, Ingredient>,
) -> Vec<AlertDraft> {
    inventory_alerts(records, ingredients)
}

/// A stored forecast together with the product it is for.
#[derive(Debug, Clone)]
pub struct ForecastExposure {
    pub product: Product,
    pub forecast_date: NaiveDate,
    pub forecasted_quantity: u32,
}

fn forecast_alerts(
    today: NaiveDate,
    exposures: &[ForecastExposure],
    records: &[InventoryRecord],
    ingredients: &HashMap<IngredientId, Ingredient>,
) -> Vec<AlertDraft> {
    let by_ingredient: HashMap<IngredientId, &InventoryRecord> =
        records.iter().map(|r| (r.ingredient_id, r)).collect();

    let mut out = Vec::new();
    for exposure in exposures {
        for line in exposure.product.recipe.lines() {
            let (Some(record), Some(ingredient)) = (
                by_ingredient.get(&line.ingredient_id),
                ingredients.get(&line.ingredient_id),
            ) else {
                continue;
            };
            // Recipes with unconvertible lines are rejected on the sale path.
            let Ok(per_unit) = to_inventory_unit(line.quantity_needed, line.unit, ingredient.unit) else {
                continue;
            };

            let need = f64::from(exposure.forecasted_quantity) * per_unit;
            if need <= record.current_stock {
                continue;
            }
            let shortfall = need - record.current_stock;
            let severity = if shortfall > 2.0 * record.min_threshold {
                Severity::Critical
            } else {
                Severity::High
            };
            out.push(AlertDraft {
                alert_type: AlertType::Shortage,
                severity,
                message: format!(
                    "Rupture prévue {} de {} pour {} : besoin de {} {unit}, {} {unit} en stock",
                    relative_day_label(today, exposure.forecast_date),
                    ingredient.name,
                    exposure.product.name,
                    qty(need),
                    qty(record.current_stock),
                    unit = ingredient.unit,
                ),
            });
        }
    }
    out
}

/// Planned headcount for one day.
#[derive(Debug, Clone)]
pub struct StaffingDay {
    pub date: NaiveDate,
    pub planned: Vec<PlannedStaffing>,
}

fn staffing_alerts(
    days: &[StaffingDay],
    history: &[SaleObservation],
    fallback: Option<&StaffingPlan>,
) -> Vec<AlertDraft> {
    let fallback = fallback.map(StaffingPlan::by_slot).unwrap_or_default();

    let mut out = Vec::new();
    for day in days.iter().filter(|d| !d.planned.is_empty()) {
        let computed: HashMap<String, u32> = recommend_staffing(day.date, history)
            .into_iter()
            .map(|s| (s.slot, s.recommended_staff))
            .collect();

        for slot in &SLOTS {
            let Some(planned) = day.planned.iter().find(|p| p.slot_label == slot.label) else {
                continue;
            };
            let Some(recommended) = computed
                .get(slot.label)
                .or_else(|| fallback.get(slot.label))
                .copied()
            else {
                continue;
            };

            let alert_type = match planned.planned_count.cmp(&recommended) {
                std::cmp::Ordering::Greater => AlertType::Overstaffing,
                std::cmp::Ordering::Less => AlertType::Understaffing,
                std::cmp::Ordering::Equal => continue,
            };
            let severity = if planned.planned_count.abs_diff(recommended) >= 2 {
                Severity::High
            } else {
                Severity::Medium
            };
            let label = match alert_type {
                AlertType::Overstaffing => "Sureffectif",
                _ => "Sous-effectif",
            };
            out.push(AlertDraft {
                alert_type,
                severity,
                message: format!(
                    "{label} le {} ({}) : {} prévus, {} recommandés",
                    day.date.format("%d/%m/%Y"),
                    slot.label,
                    planned.planned_count,
                    recommended
                ),
            });
        }
    }
    out
}

/// Everything a regeneration pass reads.
#[derive(Debug, Clone, Default)]
pub struct AlertSnapshot {
    pub today: NaiveDate,
    pub records: Vec<InventoryRecord>,
    pub ingredients: HashMap<IngredientId, Ingredient>,
    /// Tomorrow's forecasts for products that have a recipe.
    pub forecasts: Vec<ForecastExposure>,
    /// Days from today through the next six with planned staffing.
    pub staffing: Vec<StaffingDay>,
    pub sales_history: Vec<SaleObservation>,
    /// Most recent persisted STAFFING recommendation, used for slots without history.
    pub staffing_fallback: Option<StaffingPlan>,
}

#[derive(Debug, Clone)]
pub struct AlertJob {
    pub organization_id: OrganizationId,
    pub restaurant_id: RestaurantId,
    pub snapshot: AlertSnapshot,
}

impl PlanningJob for AlertJob {
    type Output = Vec<AlertDraft>;

    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    fn restaurant_id(&self) -> RestaurantId {
        self.restaurant_id
    }

    fn run(&self) -> Result<Vec<AlertDraft>, PlanningError> {
        let s = &self.snapshot;
        let mut drafts = inventory_alerts(&s.records, &s.ingredients);
        drafts.extend(forecast_alerts(s.today, &s.forecasts, &s.records, &s.ingredients));
        drafts.extend(staffing_alerts(
            &s.staffing,
            &s.sales_history,
            s.staffing_fallback.as_ref(),
        ));
        Ok(drafts)
    }
}
