//! Bounded fan-out of a per-restaurant operation.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use serde::Serialize;
use tracing::warn;

use larder_core::RestaurantId;

use crate::error::ServiceError;

/// Per-restaurant results of a batch pass.
///
/// Both lists keep the order in which restaurants were submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<(RestaurantId, T)>,
    pub failed: Vec<(RestaurantId, String)>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Run `f` for every restaurant on at most `workers` threads.
///
/// A failing or panicking restaurant is recorded in `failed` and never stops
/// the others.
pub fn for_each_restaurant<T, F>(
    restaurants: &[RestaurantId],
    workers: usize,
    f: F,
) -> BatchOutcome<T>
where
    T: Send,
    F: Fn(RestaurantId) -> Result<T, ServiceError> + Sync,
{
    let slots: Vec<Mutex<Option<Result<T, String>>>> =
        restaurants.iter().map(|_| Mutex::new(None)).collect();
    let next = AtomicUsize::new(0);
    let workers = workers.clamp(1, restaurants.len().max(1));

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    let Some(&restaurant_id) = restaurants.get(i) else {
                        break;
                    };
                    let result = match catch_unwind(AssertUnwindSafe(|| f(restaurant_id))) {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(err)) => Err(err.to_string()),
                        Err(_) => Err("restaurant task panicked".to_string()),
                    };
                    if let Err(msg) = &result {
                        warn!(restaurant_id = %restaurant_id, error = %msg, "batch task failed");
                    }
                    if let Ok(mut slot) = slots[i].lock() {
                        *slot = Some(result);
                    }
                }
            });
        }
    });

    let mut outcome = BatchOutcome::default();
    for (restaurant_id, slot) in restaurants.iter().zip(slots) {
        let result = slot
            .into_inner()
            .ok()
            .flatten()
            .unwrap_or_else(|| Err("result lost".to_string()));
        match result {
            Ok(value) => outcome.succeeded.push((*restaurant_id, value)),
            Err(msg) => outcome.failed.push((*restaurant_id, msg)),
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_do_not_abort_the_batch() {
        let ids: Vec<RestaurantId> = (0..6).map(|_| RestaurantId::new()).collect();
        let bad = ids[2];

        let outcome = for_each_restaurant(&ids, 3, |id| {
            if id == bad {
                Err(ServiceError::validation("boom"))
            } else {
                Ok(id)
            }
        });

        assert_eq!(outcome.total(), 6);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, bad);
        let ok: Vec<RestaurantId> = outcome.succeeded.iter().map(|(id, _)| *id).collect();
        let expected: Vec<RestaurantId> = ids.iter().copied().filter(|id| *id != bad).collect();
        assert_eq!(ok, expected);
    }

    #[test]
    fn a_panicking_restaurant_is_reported_as_failed() {
        let ids: Vec<RestaurantId> = (0..3).map(|_| RestaurantId::new()).collect();
        let bad = ids[0];

        let outcome = for_each_restaurant(&ids, 2, |id| {
            if id == bad {
                panic!("engine bug");
            }
            Ok(())
        });

        assert_eq!(outcome.succeeded.len(), 2);
        assert_eq!(outcome.failed, vec![(bad, "restaurant task panicked".to_string())]);
        assert!(!outcome.is_complete());
    }

    #[test]
    fn empty_input_is_a_complete_outcome() {
        let outcome: BatchOutcome<()> = for_each_restaurant(&[], 4, |_| Ok(()));
        assert!(outcome.is_complete());
        assert_eq!(outcome.total(), 0);
    }
}
