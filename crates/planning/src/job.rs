use larder_core::{OrganizationId, RestaurantId};

use crate::PlanningError;

/// A restaurant-scoped planning computation.
///
/// Jobs hold the snapshot they run on. This crate stays storage-agnostic:
/// inputs are loaded by callers (infra services and workers).
pub trait PlanningJob: Send + Sync {
    type Output;

    fn organization_id(&self) -> OrganizationId;

    fn restaurant_id(&self) -> RestaurantId;

    /// Execute the computation.
    ///
    /// Must not mutate state; the same snapshot always yields the same output.
    fn run(&self) -> Result<Self::Output, PlanningError>;
}
