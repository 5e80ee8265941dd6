//! Event mechanics shared by the ledger and the derived-view workers.
//!
//! Domain crates define their own event types; this crate only provides the
//! envelope, the pub/sub contract and an in-memory transport.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod scope;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use scope::RestaurantScoped;
