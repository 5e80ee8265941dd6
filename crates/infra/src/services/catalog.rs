//! Reference data maintenance and organization ownership checks.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument};

use larder_core::{IngredientId, OrganizationId, ProductId, RestaurantId};
use larder_inventory::{Ingredient, Unit, to_inventory_unit};
use larder_planning::{PlannedStaffing, Slot};
use larder_products::Product;

use crate::error::ServiceError;
use crate::store::{CatalogStore, CoreStore, LedgerTx, OrganizationSettings, Restaurant};

/// The restaurant, if it exists and belongs to `organization_id`.
///
/// Foreign restaurants are reported as missing.
pub(crate) fn owned_restaurant<S>(
    store: &S,
    organization_id: OrganizationId,
    id: RestaurantId,
) -> Result<Restaurant, ServiceError>
where
    S: CatalogStore + ?Sized,
{
    match store.restaurant(id)? {
        Some(r) if r.organization_id == organization_id => Ok(r),
        _ => Err(ServiceError::not_found(format!("restaurant {id}"))),
    }
}

pub(crate) fn owned_product<S>(
    store: &S,
    organization_id: OrganizationId,
    id: ProductId,
) -> Result<Product, ServiceError>
where
    S: CatalogStore + ?Sized,
{
    match store.product(id)? {
        Some(p) if p.organization_id == organization_id => Ok(p),
        _ => Err(ServiceError::not_found(format!("product {id}"))),
    }
}

/// [`owned_product`] read through an open ledger transaction.
pub(crate) fn owned_product_tx(
    tx: &mut dyn LedgerTx,
    organization_id: OrganizationId,
    id: ProductId,
) -> Result<Product, ServiceError> {
    match tx.product(id)? {
        Some(p) if p.organization_id == organization_id => Ok(p),
        _ => Err(ServiceError::not_found(format!("product {id}"))),
    }
}

pub(crate) fn owned_ingredient<S>(
    store: &S,
    organization_id: OrganizationId,
    id: IngredientId,
) -> Result<Ingredient, ServiceError>
where
    S: CatalogStore + ?Sized,
{
    match store.ingredient(id)? {
        Some(i) if i.organization_id == organization_id => Ok(i),
        _ => Err(ServiceError::not_found(format!("ingredient {id}"))),
    }
}

/// Inventory unit of every ingredient of the organization.
pub(crate) fn inventory_units<S>(
    store: &S,
    organization_id: OrganizationId,
) -> Result<HashMap<IngredientId, Unit>, ServiceError>
where
    S: CatalogStore + ?Sized,
{
    Ok(store
        .ingredients(organization_id)?
        .into_iter()
        .map(|i| (i.id, i.unit))
        .collect())
}

/// Catalog maintenance. Identity and CRUD belong to collaborators; this is
/// the minimal surface used for seeding and development.
pub struct CatalogService<S> {
    store: Arc<S>,
}

impl<S> Clone for CatalogService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: CoreStore> CatalogService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn create_restaurant(
        &self,
        organization_id: OrganizationId,
        name: impl Into<String>,
    ) -> Result<Restaurant, ServiceError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ServiceError::validation("restaurant name must not be empty"));
        }
        let restaurant = Restaurant {
            id: RestaurantId::new(),
            organization_id,
            name,
        };
        self.store.upsert_restaurant(restaurant.clone())?;
        info!(organization_id = %organization_id, restaurant_id = %restaurant.id, "restaurant created");
        Ok(restaurant)
    }

    pub fn restaurants(&self, organization_id: OrganizationId) -> Result<Vec<Restaurant>, ServiceError> {
        Ok(self.store.restaurants(organization_id)?)
    }

    pub fn set_default_shrink(
        &self,
        organization_id: OrganizationId,
        default_shrink_pct: Option<f64>,
    ) -> Result<(), ServiceError> {
        if let Some(pct) = default_shrink_pct {
            if !(0.0..=1.0).contains(&pct) {
                return Err(ServiceError::validation("default_shrink_pct must be within 0..=1"));
            }
        }
        self.store.upsert_settings(OrganizationSettings {
            organization_id,
            default_shrink_pct,
        })?;
        Ok(())
    }

    #[instrument(skip(self, ingredient), fields(ingredient_id = %ingredient.id), err)]
    pub fn upsert_ingredient(
        &self,
        organization_id: OrganizationId,
        ingredient: Ingredient,
    ) -> Result<Ingredient, ServiceError> {
        if ingredient.organization_id != organization_id {
            return Err(ServiceError::validation("ingredient belongs to another organization"));
        }
        ingredient.validate()?;
        if let Some(existing) = self.store.ingredient(ingredient.id)? {
            if existing.organization_id != organization_id {
                return Err(ServiceError::not_found(format!("ingredient {}", ingredient.id)));
            }
        }
        self.store.upsert_ingredient(ingredient.clone())?;
        Ok(ingredient)
    }

    /// Store a product after checking that every recipe line names an
    /// ingredient of the organization in a convertible unit.
    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    pub fn upsert_product(
        &self,
        organization_id: OrganizationId,
        product: Product,
    ) -> Result<Product, ServiceError> {
        if product.organization_id != organization_id {
            return Err(ServiceError::validation("product belongs to another organization"));
        }
        product.validate()?;
        if let Some(existing) = self.store.product(product.id)? {
            if existing.organization_id != organization_id {
                return Err(ServiceError::not_found(format!("product {}", product.id)));
            }
        }
        for line in product.recipe.lines() {
            let ingredient = owned_ingredient(&*self.store, organization_id, line.ingredient_id)
                .map_err(|_| {
                    ServiceError::validation(format!(
                        "recipe references unknown ingredient {}",
                        line.ingredient_id
                    ))
                })?;
            to_inventory_unit(line.quantity_needed, line.unit, ingredient.unit)?;
        }
        self.store.upsert_product(product.clone())?;
        Ok(product)
    }

    pub fn plan_staffing(
        &self,
        organization_id: OrganizationId,
        planned: PlannedStaffing,
    ) -> Result<PlannedStaffing, ServiceError> {
        owned_restaurant(&*self.store, organization_id, planned.restaurant_id)?;
        if Slot::by_label(&planned.slot_label).is_none() {
            return Err(ServiceError::validation(format!(
                "unknown staffing slot {}",
                planned.slot_label
            )));
        }
        self.store.upsert_planned_staffing(planned.clone())?;
        Ok(planned)
    }
}
