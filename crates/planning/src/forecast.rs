//! Daily demand forecasting from historical sales.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{ForecastId, OrganizationId, ProductId, RestaurantId};

use crate::{PlanningError, PlanningJob};

/// Forecasting method tag, stored with each forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    MovingAverage,
    Seasonality,
}

impl ForecastMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ForecastMethod::MovingAverage => "moving_average",
            ForecastMethod::Seasonality => "seasonality",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "moving_average" => Some(ForecastMethod::MovingAverage),
            "seasonality" => Some(ForecastMethod::Seasonality),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastParams {
    /// Number of most recent active days averaged by `moving_average`.
    pub window_days: u32,
    /// Weeks of same-weekday history used by `seasonality`.
    pub seasonality_weeks: u32,
}

impl Default for ForecastParams {
    fn default() -> Self {
        Self {
            window_days: 7,
            seasonality_weeks: 4,
        }
    }
}

/// Total quantity sold per calendar day for one (restaurant, product).
///
/// Only days with sales activity are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailySales {
    by_day: BTreeMap<NaiveDate, f64>,
}

impl DailySales {
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let mut by_day = BTreeMap::new();
        for (day, quantity) in observations {
            *by_day.entry(day).or_insert(0.0) += quantity;
        }
        by_day.retain(|_, q| *q > 0.0);
        Self { by_day }
    }

    pub fn is_empty(&self) -> bool {
        self.by_day.is_empty()
    }

    /// Days strictly before `day`, most recent first.
    fn before(&self, day: NaiveDate) -> impl Iterator<Item = (&NaiveDate, &f64)> {
        self.by_day.range(..day).rev()
    }

    /// Total quantity sold in `[from, to)`.
    pub fn total_between(&self, from: NaiveDate, to: NaiveDate) -> f64 {
        if from >= to {
            return 0.0;
        }
        self.by_day.range(from..to).map(|(_, q)| q).sum()
    }
}

/// Mean daily quantity over a set of active days.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub value: f64,
    pub daily: Vec<f64>,
}

impl Estimate {
    fn from_daily(daily: Vec<f64>) -> Self {
        let value = mean(&daily);
        Self { value, daily }
    }

    pub fn days_with_sales(&self) -> usize {
        self.daily.len()
    }
}

/// Mean over the `days` most recent active days before `target`.
pub fn moving_average(history: &DailySales, target: NaiveDate, days: u32) -> Estimate {
    let daily = history
        .before(target)
        .take(days as usize)
        .map(|(_, q)| *q)
        .collect();
    Estimate::from_daily(daily)
}

/// Mean over active days sharing `target`'s weekday within the last
/// `weeks * 7` days. `None` when no such day exists.
pub fn seasonality(history: &DailySales, target: NaiveDate, weeks: u32) -> Option<Estimate> {
    let since = target - Duration::days(i64::from(weeks) * 7);
    let weekday = target.weekday();
    let daily: Vec<f64> = history
        .before(target)
        .take_while(|(d, _)| **d >= since)
        .filter(|(d, _)| d.weekday() == weekday)
        .map(|(_, q)| *q)
        .collect();

    if daily.is_empty() {
        return None;
    }
    Some(Estimate::from_daily(daily))
}

/// Confidence in `[0, 0.95]` from the amount and regularity of history.
pub fn confidence(days_with_sales: usize, daily: &[f64]) -> f64 {
    let base: f64 = match days_with_sales {
        0..=2 => 0.40,
        3..=6 => 0.55,
        7..=13 => 0.70,
        _ => 0.85,
    };

    if daily.len() >= 3 {
        let m = mean(daily);
        if m > 0.0 && stddev(daily, m) / m < 0.30 {
            return (base + 0.05).min(0.95);
        }
    }
    base
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / (xs.len() as f64)
}

/// Population standard deviation.
fn stddev(xs: &[f64], mean: f64) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let var = xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (xs.len() as f64);
    var.sqrt()
}

/// Result of a forecast computation, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutcome {
    pub value: f64,
    pub confidence: f64,
    pub days_with_sales: usize,
    /// Method that actually produced `value` (seasonality may fall back).
    pub method: ForecastMethod,
}

impl ForecastOutcome {
    pub fn forecasted_quantity(&self) -> u32 {
        self.value.max(0.0).ceil() as u32
    }
}

/// Stored forecast: one per (restaurant, product, day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub id: ForecastId,
    pub restaurant_id: RestaurantId,
    pub product_id: ProductId,
    pub forecast_date: NaiveDate,
    pub forecasted_quantity: u32,
    pub method: ForecastMethod,
    pub confidence: f64,
    pub generated_at: DateTime<Utc>,
}

impl Forecast {
    pub fn from_outcome(
        restaurant_id: RestaurantId,
        product_id: ProductId,
        forecast_date: NaiveDate,
        outcome: &ForecastOutcome,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ForecastId::new(),
            restaurant_id,
            product_id,
            forecast_date,
            forecasted_quantity: outcome.forecasted_quantity(),
            method: outcome.method,
            confidence: outcome.confidence,
            generated_at,
        }
    }
}

/// Forecast for one (restaurant, product, day).
#[derive(Debug, Clone)]
pub struct ForecastJob {
    pub organization_id: OrganizationId,
    pub restaurant_id: RestaurantId,
    pub product_id: ProductId,
    pub target_date: NaiveDate,
    pub method: ForecastMethod,
    pub params: ForecastParams,
    pub history: DailySales,
}

impl PlanningJob for ForecastJob {
    type Output = ForecastOutcome;

    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    fn restaurant_id(&self) -> RestaurantId {
        self.restaurant_id
    }

    fn run(&self) -> Result<ForecastOutcome, PlanningError> {
        if self.params.window_days == 0 {
            return Err(PlanningError::invalid("window_days must be at least 1"));
        }
        if self.params.seasonality_weeks == 0 {
            return Err(PlanningError::invalid("seasonality_weeks must be at least 1"));
        }

        let seasonal = match self.method {
            ForecastMethod::Seasonality => {
                seasonality(&self.history, self.target_date, self.params.seasonality_weeks)
            }
            ForecastMethod::MovingAverage => None,
        };

        let (estimate, method) = match seasonal {
            Some(estimate) => (estimate, ForecastMethod::Seasonality),
            None => (
                moving_average(&self.history, self.target_date, self.params.window_days),
                ForecastMethod::MovingAverage,
            ),
        };

        Ok(ForecastOutcome {
            value: estimate.value,
            confidence: confidence(estimate.days_with_sales(), &estimate.daily),
            days_with_sales: estimate.days_with_sales(),
            method,
        })
    }
}
