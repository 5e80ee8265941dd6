//! `larder-infra`
//!
//! Storage, ledger transactions and the restaurant-scoped services built on
//! the pure engines of the domain crates.
//!
//! - [`store`]: store traits with in-memory and Postgres implementations
//! - [`ledger`]: the only writer of stock levels, always inside a transaction
//! - [`services`]: sale lifecycle, forecasting, recommendations and alerts
//! - [`hooks`] and [`workers`]: post-commit dispatch to derived views
//! - [`jobs`]: batch fan-out and scheduled regeneration
//! - [`config`]: runtime configuration

pub mod config;
pub mod error;
pub mod hooks;
pub mod jobs;
pub mod ledger;
pub mod services;
pub mod store;
pub mod workers;

mod integration_tests;

pub use config::CoreConfig;
pub use error::{ServiceError, StoreError, StoreResult};
pub use services::Services;
pub use store::{CoreStore, InMemoryStore, PostgresStore};
