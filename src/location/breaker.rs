//! Circuit breaker over the whole fallback chain.
//!
//! Two states only: CLOSED and OPEN. After `threshold` consecutive
//! end-to-end failures the breaker locks for a fixed window; once the lock
//! expires it goes straight back to CLOSED and a real attempt is made.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::store::{self, StateStore, BREAKER_SLOT};

/// Persisted breaker state. `locked_until == 0` means not locked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerState {
    pub failures: u32,
    pub last_fail_time: i64,
    pub locked_until: i64,
}

pub struct CircuitBreaker {
    store: Arc<dyn StateStore>,
    threshold: u32,
    lock_ms: i64,
    state: BreakerState,
}

impl CircuitBreaker {
    pub fn load(store: Arc<dyn StateStore>, threshold: u32, lock: Duration) -> Self {
        let state = store::load_json(store.as_ref(), BREAKER_SLOT).unwrap_or_default();
        Self {
            store,
            threshold,
            lock_ms: lock.as_millis() as i64,
            state,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn is_open(&self, now_ms: i64) -> bool {
        now_ms < self.state.locked_until
    }

    /// Gate a new attempt. Returns the remaining lock time if OPEN; resets an
    /// expired lock back to CLOSED.
    pub fn check(&mut self, now_ms: i64) -> Result<(), Duration> {
        if self.is_open(now_ms) {
            let remaining = (self.state.locked_until - now_ms) as u64;
            return Err(Duration::from_millis(remaining));
        }
        if self.state.locked_until != 0 {
            info!("Circuit lock expired, closing breaker");
            self.reset();
        }
        Ok(())
    }

    /// Record one failure of the entire chain.
    pub fn record_failure(&mut self, now_ms: i64) {
        self.state.failures += 1;
        self.state.last_fail_time = now_ms;
        if self.state.failures >= self.threshold {
            self.state.locked_until = now_ms + self.lock_ms;
            warn!(
                failures = self.state.failures,
                lock_secs = self.lock_ms / 1000,
                "Location providers keep failing, opening circuit"
            );
        }
        self.persist();
    }

    pub fn reset(&mut self) {
        if self.state == BreakerState::default() {
            return;
        }
        self.state = BreakerState::default();
        self.persist();
    }

    fn persist(&self) {
        store::save_json(self.store.as_ref(), BREAKER_SLOT, &self.state);
    }
}
