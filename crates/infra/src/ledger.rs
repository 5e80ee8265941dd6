//! The inventory ledger: the only writer of stock levels.

use chrono::{DateTime, Utc};
use tracing::debug;

use larder_core::{IngredientId, RestaurantId};
use larder_sales::StockDelta;

use crate::error::StoreResult;
use crate::store::LedgerTx;

/// Apply a signed delta to one (restaurant, ingredient) stock level inside
/// `tx`.
///
/// A missing record means the ingredient is not tracked at the restaurant:
/// nothing is written and `Ok(false)` is returned. The result is not clamped.
pub fn apply_delta(
    tx: &mut dyn LedgerTx,
    restaurant_id: RestaurantId,
    ingredient_id: IngredientId,
    delta: f64,
    now: DateTime<Utc>,
) -> StoreResult<bool> {
    let Some(mut record) = tx.inventory_record(restaurant_id, ingredient_id)? else {
        debug!(
            restaurant_id = %restaurant_id,
            ingredient_id = %ingredient_id,
            delta,
            "ingredient not tracked; delta skipped"
        );
        return Ok(false);
    };
    record.apply_delta(delta, now);
    tx.save_inventory_record(&record)?;
    Ok(true)
}

/// Apply planned deltas in order. Returns how many hit a tracked record.
pub fn apply_all(tx: &mut dyn LedgerTx, deltas: &[StockDelta], now: DateTime<Utc>) -> StoreResult<usize> {
    let mut applied = 0;
    for d in deltas {
        if apply_delta(tx, d.restaurant_id, d.ingredient_id, d.delta, now)? {
            applied += 1;
        }
    }
    Ok(applied)
}
