//! Background workers consuming the post-commit event bus.

pub mod alert_worker;

pub use alert_worker::{AlertWorker, WorkerHandle};
