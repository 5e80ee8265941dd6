//! Alert regeneration and resolution.
//!
//! A regeneration pass recomputes the full unresolved alert set of one
//! restaurant from a snapshot of its current state and swaps it in
//! atomically. Resolved alerts are history and are never touched.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{info, instrument};

use larder_core::{AlertId, OrganizationId, RestaurantId};
use larder_planning::{
    Alert, AlertDraft, AlertJob, AlertSnapshot, ForecastExposure, PlanningJob, RecommendationData,
    RecommendationType, StaffingDay, current_alerts_state,
};

use super::catalog::owned_restaurant;
use super::staffing::{STAFFING_HISTORY_DAYS, observations};
use crate::config::CoreConfig;
use crate::error::ServiceError;
use crate::jobs::{BatchOutcome, for_each_restaurant};
use crate::store::CoreStore;

/// Days, starting today, whose planned staffing is checked.
const STAFFING_LOOKAHEAD_DAYS: i64 = 7;

pub struct AlertService<S> {
    store: Arc<S>,
    batch_workers: usize,
}

impl<S> Clone for AlertService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            batch_workers: self.batch_workers,
        }
    }
}

impl<S: CoreStore> AlertService<S> {
    pub fn new(store: Arc<S>, config: &CoreConfig) -> Self {
        Self {
            store,
            batch_workers: config.batch_workers,
        }
    }

    fn snapshot(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
        today: NaiveDate,
    ) -> Result<AlertSnapshot, ServiceError> {
        let records = self.store.inventory_records(restaurant_id)?;
        let ingredients = self
            .store
            .ingredients(organization_id)?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();

        let tomorrow = today + Duration::days(1);
        let products: HashMap<_, _> = self
            .store
            .products(organization_id)?
            .into_iter()
            .filter(|p| p.has_recipe())
            .map(|p| (p.id, p))
            .collect();
        let forecasts = self
            .store
            .forecasts_between(restaurant_id, tomorrow, tomorrow)?
            .into_iter()
            .filter_map(|f| {
                products.get(&f.product_id).map(|product| ForecastExposure {
                    product: product.clone(),
                    forecast_date: f.forecast_date,
                    forecasted_quantity: f.forecasted_quantity,
                })
            })
            .collect();

        let last_day = today + Duration::days(STAFFING_LOOKAHEAD_DAYS - 1);
        let mut by_day: BTreeMap<NaiveDate, Vec<_>> = BTreeMap::new();
        for planned in self.store.planned_staffing(restaurant_id, today, last_day)? {
            by_day.entry(planned.plan_date).or_default().push(planned);
        }
        let staffing = by_day
            .into_iter()
            .map(|(date, planned)| StaffingDay { date, planned })
            .collect();

        let sales = self.store.sales_between(
            restaurant_id,
            today - Duration::days(STAFFING_HISTORY_DAYS),
            last_day + Duration::days(1),
        )?;

        let staffing_fallback = self
            .store
            .latest_recommendation(restaurant_id, RecommendationType::Staffing)?
            .and_then(|r| match r.data {
                RecommendationData::Staffing(plan) => Some(plan),
                RecommendationData::Order(_) => None,
            });

        Ok(AlertSnapshot {
            today,
            records,
            ingredients,
            forecasts,
            staffing,
            sales_history: observations(&sales),
            staffing_fallback,
        })
    }

    pub fn regenerate_alerts(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<Alert>, ServiceError> {
        self.regenerate_alerts_at(organization_id, restaurant_id, Utc::now())
    }

    /// Replace the restaurant's unresolved alerts with a fresh set computed
    /// as of `now`. Running it twice on unchanged state yields the same set.
    #[instrument(skip(self, now), err)]
    pub fn regenerate_alerts_at(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, ServiceError> {
        owned_restaurant(&*self.store, organization_id, restaurant_id)?;

        let job = AlertJob {
            organization_id,
            restaurant_id,
            snapshot: self.snapshot(organization_id, restaurant_id, now.date_naive())?,
        };
        let alerts: Vec<Alert> = job
            .run()?
            .into_iter()
            .map(|draft| Alert::from_draft(restaurant_id, draft, now))
            .collect();

        self.store
            .replace_unresolved_alerts(restaurant_id, alerts.clone())?;
        info!(restaurant_id = %restaurant_id, alerts = alerts.len(), "alerts regenerated");
        Ok(alerts)
    }

    /// Regenerate every restaurant of one organization.
    pub fn regenerate_all(
        &self,
        organization_id: OrganizationId,
    ) -> Result<BatchOutcome<usize>, ServiceError> {
        let now = Utc::now();
        let ids: Vec<RestaurantId> = self
            .store
            .restaurants(organization_id)?
            .into_iter()
            .map(|r| r.id)
            .collect();
        let outcome = for_each_restaurant(&ids, self.batch_workers, |restaurant_id| {
            self.regenerate_alerts_at(organization_id, restaurant_id, now)
                .map(|alerts| alerts.len())
        });
        info!(
            organization_id = %organization_id,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "alert regeneration pass finished"
        );
        Ok(outcome)
    }

    /// Regenerate every known restaurant, each under its own organization.
    pub fn regenerate_everywhere(&self) -> Result<BatchOutcome<usize>, ServiceError> {
        let now = Utc::now();
        let owners: HashMap<RestaurantId, OrganizationId> = self
            .store
            .all_restaurants()?
            .into_iter()
            .map(|r| (r.id, r.organization_id))
            .collect();
        let mut ids: Vec<RestaurantId> = owners.keys().copied().collect();
        ids.sort();

        let outcome = for_each_restaurant(&ids, self.batch_workers, |restaurant_id| {
            let organization_id = owners
                .get(&restaurant_id)
                .copied()
                .ok_or_else(|| ServiceError::not_found(format!("restaurant {restaurant_id}")))?;
            self.regenerate_alerts_at(organization_id, restaurant_id, now)
                .map(|alerts| alerts.len())
        });
        info!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "global alert regeneration finished"
        );
        Ok(outcome)
    }

    /// Inventory alerts as they would be generated now, without persisting.
    pub fn current_alerts_state(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<AlertDraft>, ServiceError> {
        owned_restaurant(&*self.store, organization_id, restaurant_id)?;
        let records = self.store.inventory_records(restaurant_id)?;
        let ingredients = self
            .store
            .ingredients(organization_id)?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();
        Ok(current_alerts_state(&records, &ingredients))
    }

    pub fn alerts(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
        include_resolved: bool,
    ) -> Result<Vec<Alert>, ServiceError> {
        owned_restaurant(&*self.store, organization_id, restaurant_id)?;
        Ok(self.store.alerts(restaurant_id, include_resolved)?)
    }

    #[instrument(skip(self), err)]
    pub fn resolve_alert(
        &self,
        organization_id: OrganizationId,
        id: AlertId,
    ) -> Result<Alert, ServiceError> {
        let alert = self
            .store
            .alert(id)?
            .ok_or_else(|| ServiceError::not_found(format!("alert {id}")))?;
        owned_restaurant(&*self.store, organization_id, alert.restaurant_id)
            .map_err(|_| ServiceError::not_found(format!("alert {id}")))?;

        let resolved = self.store.resolve_alert(id, Utc::now())?;
        info!(alert_id = %id, restaurant_id = %resolved.restaurant_id, "alert resolved");
        Ok(resolved)
    }
}
