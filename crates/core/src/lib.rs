//! `larder-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers shared by every other crate and the domain error model.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{
    AlertId, ForecastId, IngredientId, OrganizationId, ProductId, RecommendationId, RestaurantId,
    SaleId,
};
