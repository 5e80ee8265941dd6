//! Staffing recommendations per fixed time slot.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use larder_core::{OrganizationId, RestaurantId};

use crate::{PlanningError, PlanningJob};

/// Trailing window of sales history considered.
const HISTORY_DAYS: i64 = 30;
/// Sales per hour one staff member can absorb.
const SALES_PER_STAFF_HOUR: f64 = 15.0;
const MIN_STAFF: u32 = 2;

/// Fixed time-of-day window, `[start_hour, end_hour)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub label: &'static str,
    pub start_hour: u8,
    pub end_hour: u8,
}

impl Slot {
    pub fn hours(&self) -> f64 {
        f64::from(self.end_hour - self.start_hour)
    }

    pub fn contains(&self, hour: u8) -> bool {
        hour >= self.start_hour && hour < self.end_hour
    }

    pub fn by_label(label: &str) -> Option<&'static Slot> {
        SLOTS.iter().find(|s| s.label == label)
    }
}

pub const SLOTS: [Slot; 4] = [
    Slot { label: "08:00-12:00", start_hour: 8, end_hour: 12 },
    Slot { label: "12:00-14:00", start_hour: 12, end_hour: 14 },
    Slot { label: "14:00-18:00", start_hour: 14, end_hour: 18 },
    Slot { label: "18:00-22:00", start_hour: 18, end_hour: 22 },
];

/// One historical sale, reduced to what staffing needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaleObservation {
    pub sale_date: NaiveDate,
    pub sale_hour: u8,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffingSlot {
    pub slot: String,
    pub average_sales: f64,
    pub recommended_staff: u32,
}

/// Payload of a STAFFING recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffingPlan {
    pub target_date: NaiveDate,
    pub slots: Vec<StaffingSlot>,
}

impl StaffingPlan {
    pub fn by_slot(&self) -> HashMap<&str, u32> {
        self.slots
            .iter()
            .map(|s| (s.slot.as_str(), s.recommended_staff))
            .collect()
    }
}

/// Headcount entered by a manager for one slot of one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStaffing {
    pub restaurant_id: RestaurantId,
    pub plan_date: NaiveDate,
    pub slot_label: String,
    pub planned_count: u32,
}

/// Recommended headcount per slot for `target_date`.
///
/// Uses sales in `[target_date - 30, target_date)`; slots without any sale in
/// that window are omitted.
pub fn recommend_staffing(target_date: NaiveDate, history: &[SaleObservation]) -> Vec<StaffingSlot> {
    let since = target_date - Duration::days(HISTORY_DAYS);
    let window: Vec<&SaleObservation> = history
        .iter()
        .filter(|s| s.sale_date >= since && s.sale_date < target_date)
        .collect();

    SLOTS
        .iter()
        .filter_map(|slot| {
            let quantities: Vec<f64> = window
                .iter()
                .filter(|s| slot.contains(s.sale_hour))
                .map(|s| f64::from(s.quantity))
                .collect();
            if quantities.is_empty() {
                return None;
            }
            let average_sales = quantities.iter().sum::<f64>() / quantities.len() as f64;
            let per_hour = average_sales / slot.hours();
            let recommended_staff = ((per_hour / SALES_PER_STAFF_HOUR).ceil() as u32).max(MIN_STAFF);
            Some(StaffingSlot {
                slot: slot.label.to_string(),
                average_sales,
                recommended_staff,
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct StaffingJob {
    pub organization_id: OrganizationId,
    pub restaurant_id: RestaurantId,
    pub target_date: NaiveDate,
    pub history: Vec<SaleObservation>,
}

impl PlanningJob for StaffingJob {
    type Output = StaffingPlan;

    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    fn restaurant_id(&self) -> RestaurantId {
        self.restaurant_id
    }

    fn run(&self) -> Result<StaffingPlan, PlanningError> {
        Ok(StaffingPlan {
            target_date: self.target_date,
            slots: recommend_staffing(self.target_date, &self.history),
        })
    }
}
