//! Notifications emitted after a ledger transaction commits.
//!
//! These drive derived views (alerts) and are never replayed to rebuild stock:
//! the inventory records themselves are the source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{IngredientId, OrganizationId, RecommendationId, RestaurantId, SaleId};
use larder_events::Event;

/// Event: SaleRecorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub organization_id: OrganizationId,
    pub restaurant_id: RestaurantId,
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleUpdated. `restaurant_id` is the post-update restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleUpdated {
    pub organization_id: OrganizationId,
    pub restaurant_id: RestaurantId,
    pub previous_restaurant_id: RestaurantId,
    pub sale_id: SaleId,
    pub stock_changed: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleDeleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleDeleted {
    pub organization_id: OrganizationId,
    pub restaurant_id: RestaurantId,
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted (manual inventory edit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub organization_id: OrganizationId,
    pub restaurant_id: RestaurantId,
    pub ingredient_id: IngredientId,
    pub delta: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RecommendationAccepted (ORDER acceptance restocks the ingredients).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationAccepted {
    pub organization_id: OrganizationId,
    pub restaurant_id: RestaurantId,
    pub recommendation_id: RecommendationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    SaleRecorded(SaleRecorded),
    SaleUpdated(SaleUpdated),
    SaleDeleted(SaleDeleted),
    StockAdjusted(StockAdjusted),
    RecommendationAccepted(RecommendationAccepted),
}

impl LedgerEvent {
    pub fn organization_id(&self) -> OrganizationId {
        match self {
            LedgerEvent::SaleRecorded(e) => e.organization_id,
            LedgerEvent::SaleUpdated(e) => e.organization_id,
            LedgerEvent::SaleDeleted(e) => e.organization_id,
            LedgerEvent::StockAdjusted(e) => e.organization_id,
            LedgerEvent::RecommendationAccepted(e) => e.organization_id,
        }
    }

    /// Restaurant whose derived views must be refreshed.
    pub fn restaurant_id(&self) -> RestaurantId {
        match self {
            LedgerEvent::SaleRecorded(e) => e.restaurant_id,
            LedgerEvent::SaleUpdated(e) => e.restaurant_id,
            LedgerEvent::SaleDeleted(e) => e.restaurant_id,
            LedgerEvent::StockAdjusted(e) => e.restaurant_id,
            LedgerEvent::RecommendationAccepted(e) => e.restaurant_id,
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::SaleRecorded(_) => "sales.sale.recorded",
            LedgerEvent::SaleUpdated(_) => "sales.sale.updated",
            LedgerEvent::SaleDeleted(_) => "sales.sale.deleted",
            LedgerEvent::StockAdjusted(_) => "inventory.stock.adjusted",
            LedgerEvent::RecommendationAccepted(_) => "planning.recommendation.accepted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::SaleRecorded(e) => e.occurred_at,
            LedgerEvent::SaleUpdated(e) => e.occurred_at,
            LedgerEvent::SaleDeleted(e) => e.occurred_at,
            LedgerEvent::StockAdjusted(e) => e.occurred_at,
            LedgerEvent::RecommendationAccepted(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_routes_to_post_update_restaurant() {
        let to = RestaurantId::new();
        let event = LedgerEvent::SaleUpdated(SaleUpdated {
            organization_id: OrganizationId::new(),
            restaurant_id: to,
            previous_restaurant_id: RestaurantId::new(),
            sale_id: SaleId::new(),
            stock_changed: false,
            occurred_at: Utc::now(),
        });

        assert_eq!(event.restaurant_id(), to);
        assert_eq!(event.event_type(), "sales.sale.updated");
    }
}
