//! Periodic global alert regeneration on a background thread.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::services::AlertService;
use crate::store::CoreStore;

/// Config for the regeneration runner.
#[derive(Debug, Clone)]
pub struct ScheduledRegeneration {
    pub interval: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for ScheduledRegeneration {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(86_400),
            max_retries: 5,
            base_backoff: Duration::from_millis(250),
        }
    }
}

/// Handle for the running regeneration thread.
#[derive(Debug)]
pub struct RegenerationHandle {
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl RegenerationHandle {
    /// Request an extra pass. Triggers coalesce while one is already queued.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Stop the runner and wait for the thread to exit.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl ScheduledRegeneration {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the runner. It performs one pass at startup, then one per
    /// `interval` and one per coalesced trigger.
    ///
    /// A pass where the restaurant list cannot be read, or where any
    /// restaurant fails, is retried with bounded exponential backoff.
    pub fn spawn<S: CoreStore>(&self, name: &'static str, alerts: AlertService<S>) -> RegenerationHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);

        let cfg = self.clone();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || runner_loop(name, cfg, shutdown_rx, trigger_rx, alerts))
            .expect("failed to spawn alert regeneration thread");

        RegenerationHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            join: Some(join),
        }
    }
}

fn runner_loop<S: CoreStore>(
    name: &'static str,
    cfg: ScheduledRegeneration,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    alerts: AlertService<S>,
) {
    info!(runner = name, interval_secs = cfg.interval.as_secs(), "alert regeneration runner started");

    let mut next_tick = Instant::now() + cfg.interval;
    let mut pending = true;
    let mut failures: u32 = 0;
    let mut backoff_until: Option<Instant> = None;

    loop {
        match shutdown_rx.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
            Err(mpsc::TryRecvError::Empty) => {}
        }

        let now = Instant::now();
        if now >= next_tick {
            pending = true;
            while next_tick <= now {
                next_tick += cfg.interval;
            }
        }

        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        if let Some(until) = backoff_until {
            if Instant::now() < until {
                thread::sleep(Duration::from_millis(50));
                continue;
            }
            backoff_until = None;
        }

        if !pending {
            let sleep_for = next_tick
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(250));
            thread::sleep(sleep_for);
            continue;
        }
        pending = false;

        let failed = match alerts.regenerate_everywhere() {
            Ok(outcome) => {
                for (restaurant_id, error) in &outcome.failed {
                    warn!(runner = name, restaurant_id = %restaurant_id, error = %error, "restaurant regeneration failed");
                }
                !outcome.is_complete()
            }
            Err(e) => {
                warn!(runner = name, error = ?e, "failed to list restaurants for regeneration");
                true
            }
        };

        if failed {
            failures += 1;
            if failures <= cfg.max_retries {
                pending = true;
                backoff_until = Some(Instant::now() + backoff(cfg.base_backoff, failures));
            } else {
                failures = 0;
            }
        } else {
            failures = 0;
        }
    }

    info!(runner = name, "alert regeneration runner stopped");
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    // base * 2^(attempt-1), capped at 10s.
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    let ms = base.as_millis().saturating_mul(pow as u128);
    Duration::from_millis(ms.min(10_000) as u64)
}
