//! Batch and scheduled work across restaurants.
//!
//! - [`for_each_restaurant`]: bounded fan-out where one restaurant's failure
//!   never aborts the others
//! - [`ScheduledRegeneration`]: background thread re-running the global
//!   alert pass on an interval and on coalesced triggers

pub mod batch;
pub mod scheduler;

pub use batch::{BatchOutcome, for_each_restaurant};
pub use scheduler::{RegenerationHandle, ScheduledRegeneration};
