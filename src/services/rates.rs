//! Silver rate cache
//!
//! One cache instance is shared by every consumer of the rate. Concurrent
//! callers join a single in-flight fetch; a settled fetch is reused until it
//! is older than the caller's `max_age`. Failures are stored as a rate of 0;
//! `refresh` additionally tells the caller whether its fetch failed.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Upstream price-per-gram for 92.5 silver.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rate_per_gram(&self) -> crate::Result<f64>;
}

// `None` when the fetch failed or produced a non-finite rate.
type PendingRate = Shared<BoxFuture<'static, Option<f64>>>;

enum Lookup { Fresh(f64), Pending(PendingRate) }

#[derive(Default)]
struct RateState {
    value: f64,
    fetched_at: Option<Instant>,
    in_flight: Option<PendingRate>,
    generation: u64,
}

#[derive(Clone)]
pub struct RateCache {
    source: Arc<dyn RateSource>,
    state: Arc<Mutex<RateState>>,
}

fn lock(state: &Mutex<RateState>) -> MutexGuard<'_, RateState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RateCache {
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self { source, state: Arc::new(Mutex::new(RateState::default())) }
    }

    /// Current price per gram, 0 when unknown. Never fails.
    pub async fn rate_per_gram(&self, max_age: Duration) -> f64 {
        match self.lookup(max_age) {
            Lookup::Fresh(value) => value,
            Lookup::Pending(pending) => pending.await.unwrap_or(0.0),
        }
    }

    /// Fetches a fresh rate, joining a fetch already in flight.
    /// `None` when that fetch failed; the cache still settles at 0.
    pub async fn refresh(&self) -> Option<f64> {
        match self.lookup(Duration::ZERO) {
            Lookup::Fresh(value) => Some(value),
            Lookup::Pending(pending) => pending.await,
        }
    }

    fn lookup(&self, max_age: Duration) -> Lookup {
        let mut state = lock(&self.state);
        if let Some(pending) = state.in_flight.clone() {
            Lookup::Pending(pending)
        } else if state.fetched_at.is_some_and(|at| at.elapsed() < max_age) {
            Lookup::Fresh(state.value)
        } else {
            let pending = self.spawn_fetch(state.generation);
            state.in_flight = Some(pending.clone());
            Lookup::Pending(pending)
        }
    }

    /// Last settled value without triggering a fetch.
    pub fn cached(&self) -> Option<f64> {
        let state = lock(&self.state);
        state.fetched_at.map(|_| state.value)
    }

    pub fn reset(&self) {
        let mut state = lock(&self.state);
        let generation = state.generation.wrapping_add(1);
        *state = RateState { generation, ..RateState::default() };
    }

    // Runs on its own task so the fetch settles even if every caller goes away.
    fn spawn_fetch(&self, generation: u64) -> PendingRate {
        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            let fetched = match source.fetch_rate_per_gram().await {
                Ok(rate) if rate.is_finite() => Some(rate),
                Ok(rate) => {
                    warn!(rate, "silver rate is not a finite number, pricing without silver add-on");
                    None
                }
                Err(err) => {
                    warn!(error = %err, "silver rate fetch failed, pricing without silver add-on");
                    None
                }
            };
            let mut guard = lock(&state);
            if guard.generation == generation {
                guard.value = fetched.unwrap_or(0.0);
                guard.fetched_at = Some(Instant::now());
                guard.in_flight = None;
                debug!(rate = guard.value, "silver rate refreshed");
            }
            fetched
        });
        task.map(|joined| joined.ok().flatten()).boxed().shared()
    }
}
