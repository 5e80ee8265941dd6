//! Post-commit dispatch.
//!
//! Ledger operations hand their [`LedgerEvent`] to a hook only after the
//! transaction has committed. Hook failures are logged by the caller and
//! never reach the client of the mutating operation.

use std::sync::Mutex;

use anyhow::anyhow;
use tracing::debug;

use larder_events::{EventBus, EventEnvelope};
use larder_sales::LedgerEvent;

use crate::services::AlertService;
use crate::store::CoreStore;

pub trait PostCommitHook: Send + Sync {
    fn after_commit(&self, event: &LedgerEvent) -> anyhow::Result<()>;
}

/// Does nothing. Useful when derived views are refreshed on a schedule only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl PostCommitHook for NoopHook {
    fn after_commit(&self, event: &LedgerEvent) -> anyhow::Result<()> {
        debug!(restaurant_id = %event.restaurant_id(), "post-commit hook disabled");
        Ok(())
    }
}

/// Regenerates the affected restaurant's alerts synchronously.
pub struct RegenerateAlertsHook<S> {
    alerts: AlertService<S>,
}

impl<S: CoreStore> RegenerateAlertsHook<S> {
    pub fn new(alerts: AlertService<S>) -> Self {
        Self { alerts }
    }
}

impl<S: CoreStore> PostCommitHook for RegenerateAlertsHook<S> {
    fn after_commit(&self, event: &LedgerEvent) -> anyhow::Result<()> {
        self.alerts
            .regenerate_alerts(event.organization_id(), event.restaurant_id())?;
        Ok(())
    }
}

/// Publishes the event on a bus for an [`crate::workers::AlertWorker`] to pick up.
pub struct PublishHook<B> {
    bus: B,
}

impl<B> PublishHook<B>
where
    B: EventBus<EventEnvelope<LedgerEvent>>,
{
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

impl<B> PostCommitHook for PublishHook<B>
where
    B: EventBus<EventEnvelope<LedgerEvent>>,
{
    fn after_commit(&self, event: &LedgerEvent) -> anyhow::Result<()> {
        let envelope =
            EventEnvelope::wrap(event.organization_id(), event.restaurant_id(), event.clone());
        self.bus
            .publish(envelope)
            .map_err(|e| anyhow!("failed to publish ledger event: {e:?}"))
    }
}

/// Keeps every event it sees. For tests.
#[derive(Debug, Default)]
pub struct RecordingHook {
    seen: Mutex<Vec<LedgerEvent>>,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl PostCommitHook for RecordingHook {
    fn after_commit(&self, event: &LedgerEvent) -> anyhow::Result<()> {
        self.seen
            .lock()
            .map_err(|_| anyhow!("recording hook lock poisoned"))?
            .push(event.clone());
        Ok(())
    }
}
