//! `larder-planning`
//!
//! **Responsibility:** deterministic decision-support engines.
//!
//! - Demand forecasting with a confidence score
//! - BOM-driven order recommendations
//! - Staffing recommendations per fixed time slot
//! - Alert derivation from inventory, forecasts and planned staffing
//!
//! Engines consume snapshots supplied by callers (infra services) and never
//! mutate state: they return values that higher layers persist.

pub mod alerts;
pub mod error;
pub mod forecast;
pub mod job;
pub mod orders;
pub mod recommendation;
pub mod staffing;

pub use alerts::{
    Alert, AlertDraft, AlertJob, AlertSnapshot, AlertType, ForecastExposure, Severity,
    StaffingDay, current_alerts_state, relative_day_label,
};
pub use error::PlanningError;
pub use forecast::{
    DailySales, Estimate, Forecast, ForecastJob, ForecastMethod, ForecastOutcome, ForecastParams,
    confidence, moving_average, seasonality,
};
pub use job::PlanningJob;
pub use orders::{
    DemandSource, OrderDetails, OrderJob, OrderLine, ProductDemand, SAVINGS_CEILING,
};
pub use recommendation::{
    Priority, Recommendation, RecommendationData, RecommendationStatus, RecommendationType,
};
pub use staffing::{
    PlannedStaffing, SLOTS, SaleObservation, Slot, StaffingJob, StaffingPlan, StaffingSlot,
    recommend_staffing,
};
