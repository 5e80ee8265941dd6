//! Runtime configuration, read from the environment.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use larder_planning::ForecastParams;

/// Tunables of the decision core.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// Shrink applied when neither the caller nor the organization sets one.
    pub default_shrink_pct: f64,
    pub order_horizon_days: u32,
    pub forecast: ForecastParams,
    /// Sales history loaded for forecasting, in days before the target date.
    pub forecast_lookback_days: u32,
    pub batch_workers: usize,
    pub regeneration_interval: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_shrink_pct: 0.10,
            order_horizon_days: 7,
            forecast: ForecastParams::default(),
            forecast_lookback_days: 365,
            batch_workers: 4,
            regeneration_interval: Duration::from_secs(86_400),
        }
    }
}

impl CoreConfig {
    /// Read `LARDER_*` variables, falling back to defaults on absent or
    /// malformed values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let d = Self::default();

        let mut shrink = read(&lookup, "LARDER_DEFAULT_SHRINK_PCT", d.default_shrink_pct);
        if !(0.0..=1.0).contains(&shrink) {
            warn!(key = "LARDER_DEFAULT_SHRINK_PCT", value = shrink, "shrink must be within 0..=1; using default");
            shrink = d.default_shrink_pct;
        }

        Self {
            default_shrink_pct: shrink,
            order_horizon_days: read(&lookup, "LARDER_ORDER_HORIZON_DAYS", d.order_horizon_days).max(1),
            forecast: ForecastParams {
                window_days: read(&lookup, "LARDER_FORECAST_WINDOW_DAYS", d.forecast.window_days).max(1),
                seasonality_weeks: read(&lookup, "LARDER_SEASONALITY_WEEKS", d.forecast.seasonality_weeks)
                    .max(1),
            },
            forecast_lookback_days: read(&lookup, "LARDER_FORECAST_LOOKBACK_DAYS", d.forecast_lookback_days)
                .max(1),
            batch_workers: read(&lookup, "LARDER_BATCH_WORKERS", d.batch_workers).max(1),
            regeneration_interval: Duration::from_secs(
                read(
                    &lookup,
                    "LARDER_REGENERATION_INTERVAL_SECS",
                    d.regeneration_interval.as_secs(),
                )
                .max(1),
            ),
        }
    }
}

fn read<L, T>(lookup: &L, key: &'static str, default: T) -> T
where
    L: Fn(&str) -> Option<String>,
    T: FromStr + Copy + core::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, default = ?default, "malformed configuration value; using default");
            default
        }),
    }
}
