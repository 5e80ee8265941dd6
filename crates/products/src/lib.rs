//! Products domain module.
//!
//! Sellable products and their bill of materials (BOM), implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;
pub mod recipe;

pub use product::Product;
pub use recipe::{BomError, Recipe, RecipeLine};
