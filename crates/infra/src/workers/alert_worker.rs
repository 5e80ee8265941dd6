use std::collections::BTreeMap;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use larder_core::{OrganizationId, RestaurantId};
use larder_events::{EventBus, EventEnvelope, Subscription};
use larder_sales::LedgerEvent;

use crate::services::AlertService;
use crate::store::CoreStore;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Regenerates alerts for restaurants named by published ledger events.
///
/// - Subscribes to the bus at spawn time
/// - Drains whatever is queued and regenerates each restaurant once per batch
/// - Optional organization filter; other organizations' events are ignored
/// - Regeneration is idempotent, so redelivered events are harmless
#[derive(Debug)]
pub struct AlertWorker;

impl AlertWorker {
    pub fn spawn<B, S>(
        name: &'static str,
        bus: B,
        organization_id: Option<OrganizationId>,
        alerts: AlertService<S>,
    ) -> WorkerHandle
    where
        B: EventBus<EventEnvelope<LedgerEvent>> + 'static,
        S: CoreStore,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, organization_id, &alerts))
            .expect("failed to spawn alert worker thread");

        WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

fn worker_loop<S: CoreStore>(
    name: &'static str,
    sub: Subscription<EventEnvelope<LedgerEvent>>,
    shutdown_rx: mpsc::Receiver<()>,
    organization_id: Option<OrganizationId>,
    alerts: &AlertService<S>,
) {
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let first = match sub.recv_timeout(tick) {
            Ok(msg) => msg,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        let mut batch: BTreeMap<RestaurantId, OrganizationId> = BTreeMap::new();
        let mut queued = Some(first);
        while let Some(msg) = queued {
            let wanted = organization_id.is_none_or(|o| msg.organization_id() == o);
            if wanted {
                batch.insert(msg.restaurant_id(), msg.organization_id());
            }
            queued = sub.try_recv().ok();
        }

        for (restaurant_id, org) in batch {
            match alerts.regenerate_alerts(org, restaurant_id) {
                Ok(generated) => {
                    debug!(worker = name, restaurant_id = %restaurant_id, alerts = generated.len(), "alerts refreshed");
                }
                Err(err) => {
                    warn!(worker = name, restaurant_id = %restaurant_id, error = ?err, "alert regeneration failed");
                }
            }
        }
    }
}
