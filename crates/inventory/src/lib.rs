//! Inventory domain module.
//!
//! Units of measure, ingredients and per-restaurant stock records, implemented
//! as deterministic domain logic (no IO, no HTTP, no storage). Stock is only
//! ever mutated through [`InventoryRecord::apply_delta`], which the infra
//! ledger calls inside a store transaction.

pub mod ingredient;
pub mod record;
pub mod unit;

pub use ingredient::Ingredient;
pub use record::InventoryRecord;
pub use unit::{Unit, UnitError, UnitFamily, to_inventory_unit};
