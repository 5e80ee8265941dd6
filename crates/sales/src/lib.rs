//! Sales domain module.
//!
//! Sale records, their validation, and the pure planning of the inventory
//! effect of each lifecycle operation (create, update, delete). Nothing here
//! touches storage: the infra ledger applies the planned deltas inside a
//! transaction together with the sale row mutation.

pub mod event;
pub mod lifecycle;
pub mod sale;

pub use event::{
    LedgerEvent, RecommendationAccepted, SaleDeleted, SaleRecorded, SaleUpdated, StockAdjusted,
};
pub use lifecycle::{StockDelta, plan_create, plan_delete, plan_update};
pub use sale::{NewSale, Sale, SalePatch};
