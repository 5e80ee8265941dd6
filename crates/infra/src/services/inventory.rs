//! Inventory records and manual stock edits.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use larder_core::{IngredientId, OrganizationId, RestaurantId};
use larder_inventory::InventoryRecord;
use larder_sales::{LedgerEvent, StockAdjusted};

use super::catalog::{owned_ingredient, owned_restaurant};
use crate::error::ServiceError;
use crate::hooks::PostCommitHook;
use crate::ledger;
use crate::store::CoreStore;

pub struct InventoryService<S> {
    store: Arc<S>,
    hook: Arc<dyn PostCommitHook>,
}

impl<S> Clone for InventoryService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            hook: self.hook.clone(),
        }
    }
}

impl<S: CoreStore> InventoryService<S> {
    pub fn new(store: Arc<S>, hook: Arc<dyn PostCommitHook>) -> Self {
        Self { store, hook }
    }

    /// Start tracking an ingredient at a restaurant.
    #[instrument(skip(self), err)]
    pub fn create_record(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
        ingredient_id: IngredientId,
        current_stock: f64,
        min_threshold: f64,
        max_threshold: Option<f64>,
    ) -> Result<InventoryRecord, ServiceError> {
        owned_restaurant(&*self.store, organization_id, restaurant_id)?;
        owned_ingredient(&*self.store, organization_id, ingredient_id)?;

        let record = InventoryRecord {
            restaurant_id,
            ingredient_id,
            current_stock,
            min_threshold,
            max_threshold,
            last_updated: Utc::now(),
        };
        record.validate()?;
        self.store.create_inventory_record(record.clone())?;
        Ok(record)
    }

    /// Apply a manual signed stock correction through the ledger.
    ///
    /// Unlike sale-driven deltas, an untracked ingredient is an error here:
    /// the caller is editing a specific record.
    #[instrument(skip(self), err)]
    pub fn adjust_stock(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
        ingredient_id: IngredientId,
        delta: f64,
    ) -> Result<InventoryRecord, ServiceError> {
        if !delta.is_finite() {
            return Err(ServiceError::validation("delta must be a finite number"));
        }
        owned_restaurant(&*self.store, organization_id, restaurant_id)?;

        let now = Utc::now();
        let record = self.store.transaction(|tx| -> Result<InventoryRecord, ServiceError> {
            let Some(mut record) = tx.inventory_record(restaurant_id, ingredient_id)? else {
                return Err(ServiceError::not_found(format!(
                    "inventory record {restaurant_id}/{ingredient_id}"
                )));
            };
            ledger::apply_delta(tx, restaurant_id, ingredient_id, delta, now)?;
            record.apply_delta(delta, now);
            Ok(record)
        })?;

        info!(
            restaurant_id = %restaurant_id,
            ingredient_id = %ingredient_id,
            delta,
            current_stock = record.current_stock,
            "stock adjusted"
        );

        let event = LedgerEvent::StockAdjusted(StockAdjusted {
            organization_id,
            restaurant_id,
            ingredient_id,
            delta,
            occurred_at: now,
        });
        if let Err(err) = self.hook.after_commit(&event) {
            warn!(restaurant_id = %restaurant_id, error = %err, "post-commit hook failed after stock adjustment");
        }
        Ok(record)
    }

    pub fn set_thresholds(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
        ingredient_id: IngredientId,
        min_threshold: f64,
        max_threshold: Option<f64>,
    ) -> Result<InventoryRecord, ServiceError> {
        owned_restaurant(&*self.store, organization_id, restaurant_id)?;
        let probe = InventoryRecord {
            restaurant_id,
            ingredient_id,
            current_stock: 0.0,
            min_threshold,
            max_threshold,
            last_updated: Utc::now(),
        };
        probe.validate()?;
        Ok(self
            .store
            .set_thresholds(restaurant_id, ingredient_id, min_threshold, max_threshold)?)
    }

    pub fn records(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<InventoryRecord>, ServiceError> {
        owned_restaurant(&*self.store, organization_id, restaurant_id)?;
        Ok(self.store.inventory_records(restaurant_id)?)
    }
}
