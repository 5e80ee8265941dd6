//! Inventory effect of sale lifecycle operations.
//!
//! Each planner returns the ordered list of signed deltas the ledger must
//! apply. Planning converts every recipe line up front, so an incompatible
//! unit aborts the operation before any stock is touched.

use serde::{Deserialize, Serialize};

use larder_core::{IngredientId, RestaurantId};
use larder_inventory::Unit;
use larder_products::{BomError, Product};

use crate::Sale;

/// Signed change to one (restaurant, ingredient) stock level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StockDelta {
    pub restaurant_id: RestaurantId,
    pub ingredient_id: IngredientId,
    pub delta: f64,
}

fn deltas<F>(
    restaurant_id: RestaurantId,
    product: &Product,
    quantity: u32,
    sign: f64,
    inventory_unit: &F,
) -> Result<Vec<StockDelta>, BomError>
where
    F: Fn(IngredientId) -> Option<Unit>,
{
    let used = product.recipe.consumption(f64::from(quantity), inventory_unit)?;
    Ok(used
        .into_iter()
        .map(|(ingredient_id, amount)| StockDelta {
            restaurant_id,
            ingredient_id,
            delta: sign * amount,
        })
        .collect())
}

/// Deduct the sale's consumption at its restaurant.
pub fn plan_create<F>(
    sale: &Sale,
    product: &Product,
    inventory_unit: F,
) -> Result<Vec<StockDelta>, BomError>
where
    F: Fn(IngredientId) -> Option<Unit>,
{
    deltas(sale.restaurant_id, product, sale.quantity, -1.0, &inventory_unit)
}

/// Reverse the old consumption, then deduct the new one.
///
/// Both steps target the post-update restaurant. When neither product nor
/// quantity changed there is nothing to apply.
pub fn plan_update<F>(
    before: &Sale,
    before_product: &Product,
    after: &Sale,
    after_product: &Product,
    inventory_unit: F,
) -> Result<Vec<StockDelta>, BomError>
where
    F: Fn(IngredientId) -> Option<Unit>,
{
    if !before.consumes_differently(after) {
        return Ok(Vec::new());
    }

    let mut planned = deltas(
        after.restaurant_id,
        before_product,
        before.quantity,
        1.0,
        &inventory_unit,
    )?;
    planned.extend(deltas(
        after.restaurant_id,
        after_product,
        after.quantity,
        -1.0,
        &inventory_unit,
    )?);
    Ok(planned)
}

/// Give back the consumption of the sale as currently stored.
pub fn plan_delete<F>(
    sale: &Sale,
    product: &Product,
    inventory_unit: F,
) -> Result<Vec<StockDelta>, BomError>
where
    F: Fn(IngredientId) -> Option<Unit>,
{
    deltas(sale.restaurant_id, product, sale.quantity, 1.0, &inventory_unit)
}
