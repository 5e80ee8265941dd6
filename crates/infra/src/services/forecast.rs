use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use tracing::{info, instrument};

use larder_core::{OrganizationId, ProductId, RestaurantId};
use larder_planning::{DailySales, Forecast, ForecastJob, ForecastMethod, ForecastParams, PlanningJob};

use super::catalog::{owned_product, owned_restaurant};
use crate::config::CoreConfig;
use crate::error::ServiceError;
use crate::store::CoreStore;

/// Computes and stores daily demand forecasts.
pub struct ForecastService<S> {
    store: Arc<S>,
    params: ForecastParams,
    lookback_days: u32,
}

impl<S> Clone for ForecastService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            params: self.params,
            lookback_days: self.lookback_days,
        }
    }
}

impl<S: CoreStore> ForecastService<S> {
    pub fn new(store: Arc<S>, config: &CoreConfig) -> Self {
        Self {
            store,
            params: config.forecast,
            lookback_days: config.forecast_lookback_days,
        }
    }

    /// Forecast `product` at `restaurant` for `date` and upsert the result.
    ///
    /// The stored method is the one that produced the value: a seasonality
    /// request without same-weekday history is stored as `moving_average`.
    #[instrument(skip(self), err)]
    pub fn run_forecast(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
        product_id: ProductId,
        date: NaiveDate,
        method: ForecastMethod,
    ) -> Result<Forecast, ServiceError> {
        owned_restaurant(&*self.store, organization_id, restaurant_id)?;
        owned_product(&*self.store, organization_id, product_id)?;

        let since = date - Duration::days(i64::from(self.lookback_days));
        let sales = self.store.sales_between(restaurant_id, since, date)?;
        let history = DailySales::from_observations(
            sales
                .iter()
                .filter(|s| s.product_id == product_id)
                .map(|s| (s.sale_date, f64::from(s.quantity))),
        );

        let job = ForecastJob {
            organization_id,
            restaurant_id,
            product_id,
            target_date: date,
            method,
            params: self.params,
            history,
        };
        let outcome = job.run()?;
        let forecast = Forecast::from_outcome(restaurant_id, product_id, date, &outcome, Utc::now());
        let stored = self.store.upsert_forecast(forecast)?;

        info!(
            forecast_id = %stored.id,
            forecasted_quantity = stored.forecasted_quantity,
            confidence = stored.confidence,
            method = stored.method.as_str(),
            days_with_sales = outcome.days_with_sales,
            "forecast stored"
        );
        Ok(stored)
    }

    pub fn get_forecast(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
        product_id: ProductId,
        date: NaiveDate,
    ) -> Result<Option<Forecast>, ServiceError> {
        owned_restaurant(&*self.store, organization_id, restaurant_id)?;
        Ok(self.store.forecast(restaurant_id, product_id, date)?)
    }
}
