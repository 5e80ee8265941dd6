//! ORDER recommendations from stored forecasts, recent sales and stock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument};

use larder_core::{OrganizationId, ProductId, RestaurantId};
use larder_planning::{
    OrderJob, PlanningJob, ProductDemand, Recommendation, RecommendationData,
};

use super::catalog::owned_restaurant;
use crate::config::CoreConfig;
use crate::error::ServiceError;
use crate::jobs::{BatchOutcome, for_each_restaurant};
use crate::store::CoreStore;

const TRAILING_DAYS: i64 = 14;

pub struct OrderService<S> {
    store: Arc<S>,
    config: CoreConfig,
}

impl<S> Clone for OrderService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: CoreStore> OrderService<S> {
    pub fn new(store: Arc<S>, config: CoreConfig) -> Self {
        Self { store, config }
    }

    /// Shrink from the caller, else the organization setting, else the
    /// configured default.
    fn resolve_shrink(
        &self,
        organization_id: OrganizationId,
        shrink_pct: Option<f64>,
    ) -> Result<f64, ServiceError> {
        if let Some(pct) = shrink_pct {
            return Ok(pct);
        }
        let org_default = self
            .store
            .settings(organization_id)?
            .and_then(|s| s.default_shrink_pct);
        Ok(org_default.unwrap_or(self.config.default_shrink_pct))
    }

    pub fn generate_order_recommendations(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
        shrink_pct: Option<f64>,
        horizon_days: Option<u32>,
    ) -> Result<Option<Recommendation>, ServiceError> {
        self.generate_order_recommendations_at(
            organization_id,
            restaurant_id,
            shrink_pct,
            horizon_days,
            Utc::now(),
        )
    }

    /// Compute and persist a pending ORDER recommendation as of `now`.
    ///
    /// Returns `None` when nothing needs ordering; no row is written then.
    #[instrument(skip(self, now), err)]
    pub fn generate_order_recommendations_at(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
        shrink_pct: Option<f64>,
        horizon_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<Option<Recommendation>, ServiceError> {
        owned_restaurant(&*self.store, organization_id, restaurant_id)?;
        let shrink_pct = self.resolve_shrink(organization_id, shrink_pct)?;
        let horizon_days = horizon_days.unwrap_or(self.config.order_horizon_days);
        let today = now.date_naive();

        let ingredients: HashMap<_, _> = self
            .store
            .ingredients(organization_id)?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();
        let stock: HashMap<_, _> = self
            .store
            .inventory_records(restaurant_id)?
            .into_iter()
            .map(|r| (r.ingredient_id, r.current_stock))
            .collect();

        // Earliest forecast per product within the horizon.
        let mut forecast_daily: HashMap<ProductId, u32> = HashMap::new();
        let horizon_end = today + Duration::days(i64::from(horizon_days));
        for f in self.store.forecasts_between(restaurant_id, today, horizon_end)? {
            forecast_daily
                .entry(f.product_id)
                .or_insert(f.forecasted_quantity);
        }

        let mut trailing: HashMap<ProductId, f64> = HashMap::new();
        for sale in self
            .store
            .sales_between(restaurant_id, today - Duration::days(TRAILING_DAYS), today)?
        {
            *trailing.entry(sale.product_id).or_insert(0.0) += f64::from(sale.quantity);
        }

        let demand: Vec<ProductDemand> = self
            .store
            .products(organization_id)?
            .into_iter()
            .filter(|p| {
                let keep = p.has_recipe();
                if !keep {
                    debug!(product_id = %p.id, "product has no recipe; skipped for ordering");
                }
                keep
            })
            .map(|product| ProductDemand {
                forecast_daily: forecast_daily.get(&product.id).copied(),
                trailing_quantity: trailing.get(&product.id).copied().unwrap_or(0.0),
                product,
            })
            .collect();

        let job = OrderJob {
            organization_id,
            restaurant_id,
            today,
            shrink_pct,
            horizon_days,
            demand,
            ingredients,
            stock,
        };
        let details = job.run()?;

        if details.is_empty() {
            info!(restaurant_id = %restaurant_id, "nothing to order");
            return Ok(None);
        }

        let priority = details.priority();
        let lines = details.lines.len();
        let savings = details.estimated_savings;
        let recommendation =
            Recommendation::pending(restaurant_id, RecommendationData::Order(details), priority, now);
        self.store.insert_recommendation(&recommendation)?;

        info!(
            recommendation_id = %recommendation.id,
            lines,
            estimated_savings = savings,
            priority = priority.as_str(),
            "order recommendation created"
        );
        Ok(Some(recommendation))
    }

    /// Order recommendations for every restaurant of the organization.
    pub fn generate_for_all_restaurants(
        &self,
        organization_id: OrganizationId,
        shrink_pct: Option<f64>,
        horizon_days: Option<u32>,
    ) -> Result<BatchOutcome<Option<Recommendation>>, ServiceError> {
        let now = Utc::now();
        let ids: Vec<RestaurantId> = self
            .store
            .restaurants(organization_id)?
            .into_iter()
            .map(|r| r.id)
            .collect();

        let outcome = for_each_restaurant(&ids, self.config.batch_workers, |restaurant_id| {
            self.generate_order_recommendations_at(
                organization_id,
                restaurant_id,
                shrink_pct,
                horizon_days,
                now,
            )
        });
        info!(
            organization_id = %organization_id,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "order recommendation pass finished"
        );
        Ok(outcome)
    }
}
