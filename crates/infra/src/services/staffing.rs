use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{info, instrument};

use larder_core::{OrganizationId, RestaurantId};
use larder_planning::{
    PlanningJob, Priority, Recommendation, RecommendationData, SaleObservation, StaffingJob,
};
use larder_sales::Sale;

use super::catalog::owned_restaurant;
use crate::error::ServiceError;
use crate::store::CoreStore;

/// Days of sales history behind a staffing recommendation.
pub(crate) const STAFFING_HISTORY_DAYS: i64 = 30;

pub(crate) fn observations(sales: &[Sale]) -> Vec<SaleObservation> {
    sales
        .iter()
        .map(|s| SaleObservation {
            sale_date: s.sale_date,
            sale_hour: s.sale_hour,
            quantity: s.quantity,
        })
        .collect()
}

pub struct StaffingService<S> {
    store: Arc<S>,
}

impl<S> Clone for StaffingService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: CoreStore> StaffingService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn generate_staffing_recommendations(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
        target_date: NaiveDate,
    ) -> Result<Option<Recommendation>, ServiceError> {
        self.generate_staffing_recommendations_at(organization_id, restaurant_id, target_date, Utc::now())
    }

    /// Persist a pending STAFFING recommendation for `target_date`.
    ///
    /// `None` when no slot has sales in the trailing window.
    #[instrument(skip(self, now), err)]
    pub fn generate_staffing_recommendations_at(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
        target_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Option<Recommendation>, ServiceError> {
        owned_restaurant(&*self.store, organization_id, restaurant_id)?;

        let since = target_date - Duration::days(STAFFING_HISTORY_DAYS);
        let sales = self.store.sales_between(restaurant_id, since, target_date)?;
        let job = StaffingJob {
            organization_id,
            restaurant_id,
            target_date,
            history: observations(&sales),
        };
        let plan = job.run()?;
        if plan.slots.is_empty() {
            info!(restaurant_id = %restaurant_id, "no sales history for staffing");
            return Ok(None);
        }

        let slots = plan.slots.len();
        let recommendation = Recommendation::pending(
            restaurant_id,
            RecommendationData::Staffing(plan),
            Priority::Medium,
            now,
        );
        self.store.insert_recommendation(&recommendation)?;
        info!(recommendation_id = %recommendation.id, slots, "staffing recommendation created");
        Ok(Some(recommendation))
    }
}
