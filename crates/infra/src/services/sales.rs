//! Sale lifecycle adapter.
//!
//! Every operation mutates the sale row and applies its inventory deltas in
//! one ledger transaction, then hands a [`LedgerEvent`] to the post-commit
//! hook. Units are converted before any row is written, so an incompatible
//! recipe line aborts the operation with nothing persisted.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use larder_core::{OrganizationId, SaleId};
use larder_sales::{
    LedgerEvent, NewSale, Sale, SaleDeleted, SalePatch, SaleRecorded, SaleUpdated, plan_create,
    plan_delete, plan_update,
};

use super::catalog::{inventory_units, owned_product, owned_product_tx, owned_restaurant};
use crate::error::ServiceError;
use crate::hooks::PostCommitHook;
use crate::ledger;
use crate::store::CoreStore;

pub struct SaleLifecycle<S> {
    store: Arc<S>,
    hook: Arc<dyn PostCommitHook>,
}

impl<S> Clone for SaleLifecycle<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            hook: self.hook.clone(),
        }
    }
}

impl<S: CoreStore> SaleLifecycle<S> {
    pub fn new(store: Arc<S>, hook: Arc<dyn PostCommitHook>) -> Self {
        Self { store, hook }
    }

    fn notify(&self, event: LedgerEvent) {
        if let Err(err) = self.hook.after_commit(&event) {
            warn!(
                restaurant_id = %event.restaurant_id(),
                error = %err,
                "post-commit hook failed; derived views may be stale"
            );
        }
    }

    /// Sale owned by the organization, read outside any transaction.
    fn owned_sale(&self, organization_id: OrganizationId, id: SaleId) -> Result<Sale, ServiceError> {
        match self.store.sale(id)? {
            Some(s) if s.organization_id == organization_id => Ok(s),
            _ => Err(ServiceError::not_found(format!("sale {id}"))),
        }
    }

    #[instrument(
        skip(self, new_sale),
        fields(restaurant_id = %new_sale.restaurant_id, product_id = %new_sale.product_id),
        err
    )]
    pub fn record_sale(
        &self,
        organization_id: OrganizationId,
        new_sale: NewSale,
    ) -> Result<Sale, ServiceError> {
        new_sale.validate()?;
        owned_restaurant(&*self.store, organization_id, new_sale.restaurant_id)?;
        let product = owned_product(&*self.store, organization_id, new_sale.product_id)?;
        let units = inventory_units(&*self.store, organization_id)?;

        let sale = new_sale.into_sale(SaleId::new(), organization_id);
        let deltas = plan_create(&sale, &product, |id| units.get(&id).copied())?;
        if deltas.is_empty() {
            debug!(product_id = %product.id, "product has no recipe; sale does not touch inventory");
        }

        let now = Utc::now();
        let applied = self.store.transaction(|tx| -> Result<usize, ServiceError> {
            tx.insert_sale(&sale)?;
            Ok(ledger::apply_all(tx, &deltas, now)?)
        })?;

        info!(sale_id = %sale.id, quantity = sale.quantity, applied, "sale recorded");
        self.notify(LedgerEvent::SaleRecorded(SaleRecorded {
            organization_id,
            restaurant_id: sale.restaurant_id,
            sale_id: sale.id,
            occurred_at: now,
        }));
        Ok(sale)
    }

    /// Apply `patch`. When product or quantity change, the old consumption
    /// is given back before the new one is deducted, both at the
    /// post-update restaurant.
    #[instrument(skip(self, patch), fields(sale_id = %id), err)]
    pub fn update_sale(
        &self,
        organization_id: OrganizationId,
        id: SaleId,
        patch: SalePatch,
    ) -> Result<Sale, ServiceError> {
        patch.validate()?;
        self.owned_sale(organization_id, id)?;
        if let Some(restaurant_id) = patch.restaurant_id {
            owned_restaurant(&*self.store, organization_id, restaurant_id)?;
        }
        if let Some(product_id) = patch.product_id {
            owned_product(&*self.store, organization_id, product_id)?;
        }
        let units = inventory_units(&*self.store, organization_id)?;

        let now = Utc::now();
        let store = &*self.store;
        let (before, after, applied) =
            store.transaction(|tx| -> Result<(Sale, Sale, usize), ServiceError> {
                let before = tx
                    .sale(id)?
                    .ok_or_else(|| ServiceError::not_found(format!("sale {id}")))?;
                let after = before.patched(&patch);

                let deltas = if before.consumes_differently(&after) {
                    let before_product = owned_product_tx(tx, organization_id, before.product_id)?;
                    let after_product = owned_product_tx(tx, organization_id, after.product_id)?;
                    plan_update(&before, &before_product, &after, &after_product, |i| {
                        units.get(&i).copied()
                    })?
                } else {
                    Vec::new()
                };

                tx.update_sale(&after)?;
                let applied = ledger::apply_all(tx, &deltas, now)?;
                Ok((before, after, applied))
            })?;

        let stock_changed = before.consumes_differently(&after);
        info!(
            sale_id = %id,
            restaurant_id = %after.restaurant_id,
            stock_changed,
            applied,
            "sale updated"
        );
        self.notify(LedgerEvent::SaleUpdated(SaleUpdated {
            organization_id,
            restaurant_id: after.restaurant_id,
            previous_restaurant_id: before.restaurant_id,
            sale_id: id,
            stock_changed,
            occurred_at: now,
        }));
        Ok(after)
    }

    /// Give back the sale's consumption and delete it.
    #[instrument(skip(self), fields(sale_id = %id), err)]
    pub fn delete_sale(&self, organization_id: OrganizationId, id: SaleId) -> Result<Sale, ServiceError> {
        self.owned_sale(organization_id, id)?;
        let units = inventory_units(&*self.store, organization_id)?;

        let now = Utc::now();
        let store = &*self.store;
        let (sale, applied) = store.transaction(|tx| -> Result<(Sale, usize), ServiceError> {
            let sale = tx
                .sale(id)?
                .ok_or_else(|| ServiceError::not_found(format!("sale {id}")))?;
            let product = owned_product_tx(tx, organization_id, sale.product_id)?;
            let deltas = plan_delete(&sale, &product, |i| units.get(&i).copied())?;

            let applied = ledger::apply_all(tx, &deltas, now)?;
            tx.delete_sale(id)?;
            Ok((sale, applied))
        })?;

        info!(sale_id = %id, restaurant_id = %sale.restaurant_id, applied, "sale deleted");
        self.notify(LedgerEvent::SaleDeleted(SaleDeleted {
            organization_id,
            restaurant_id: sale.restaurant_id,
            sale_id: id,
            occurred_at: now,
        }));
        Ok(sale)
    }

    pub fn sale(&self, organization_id: OrganizationId, id: SaleId) -> Result<Sale, ServiceError> {
        self.owned_sale(organization_id, id)
    }
}
