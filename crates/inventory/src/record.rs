use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult, IngredientId, RestaurantId};

/// Stock of one ingredient at one restaurant, in the ingredient's unit.
///
/// Created explicitly per restaurant; a missing record means the ingredient
/// is not tracked there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub restaurant_id: RestaurantId,
    pub ingredient_id: IngredientId,
    pub current_stock: f64,
    pub min_threshold: f64,
    pub max_threshold: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

impl InventoryRecord {
    pub fn validate(&self) -> DomainResult<()> {
        if !self.current_stock.is_finite() {
            return Err(DomainError::validation("current_stock must be finite"));
        }
        if !self.min_threshold.is_finite() || self.min_threshold < 0.0 {
            return Err(DomainError::validation("min_threshold must be non-negative"));
        }
        if let Some(max) = self.max_threshold {
            if !max.is_finite() || max < self.min_threshold {
                return Err(DomainError::validation(
                    "max_threshold must be at least min_threshold",
                ));
            }
        }
        Ok(())
    }

    /// Apply a signed stock delta.
    ///
    /// The result is not clamped: stock may go transiently negative (e.g. a
    /// sale recorded before the day's delivery).
    pub fn apply_delta(&mut self, delta: f64, now: DateTime<Utc>) {
        self.current_stock += delta;
        self.last_updated = now;
    }

    /// Strictly above the maximum threshold, when one is set.
    pub fn is_overstocked(&self) -> bool {
        self.max_threshold.is_some_and(|max| self.current_stock > max)
    }

    /// `current / min` when stock is strictly below the minimum threshold.
    ///
    /// A zero minimum yields a ratio of 0, so negative stock against it still
    /// reads as the most severe shortage.
    pub fn shortage_ratio(&self) -> Option<f64> {
        if self.current_stock >= self.min_threshold {
            return None;
        }
        if self.min_threshold > 0.0 {
            Some(self.current_stock / self.min_threshold)
        } else {
            Some(0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(stock: f64, min: f64, max: Option<f64>) -> InventoryRecord {
        InventoryRecord {
            restaurant_id: RestaurantId::new(),
            ingredient_id: IngredientId::new(),
            current_stock: stock,
            min_threshold: min,
            max_threshold: max,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn apply_delta_may_go_negative() {
        let mut r = record(100.0, 500.0, None);
        let now = Utc::now();
        r.apply_delta(-250.0, now);
        assert_eq!(r.current_stock, -150.0);
        assert_eq!(r.last_updated, now);
    }

    #[test]
    fn minimum_boundary_is_exclusive() {
        assert_eq!(record(500.0, 500.0, None).shortage_ratio(), None);
        assert_eq!(record(100.0, 500.0, None).shortage_ratio(), Some(0.2));
    }

    #[test]
    fn overstock_is_strictly_above_max() {
        assert!(!record(800.0, 100.0, Some(800.0)).is_overstocked());
        assert!(record(801.0, 100.0, Some(800.0)).is_overstocked());
        assert!(!record(5000.0, 100.0, None).is_overstocked());
    }

    #[test]
    fn negative_stock_with_zero_minimum_has_zero_ratio() {
        assert_eq!(record(-3.0, 0.0, None).shortage_ratio(), Some(0.0));
        assert_eq!(record(0.0, 0.0, None).shortage_ratio(), None);
    }

    #[test]
    fn max_below_min_is_rejected() {
        assert!(record(10.0, 50.0, Some(20.0)).validate().is_err());
        assert!(record(10.0, 50.0, Some(50.0)).validate().is_ok());
    }
}
