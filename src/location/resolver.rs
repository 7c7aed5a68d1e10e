//! Location resolver — orchestrates the fallback chain.
//!
//! Flow: breaker → rate limiter → cache → strategies in priority order →
//! validate → desensitize → cache → reset breaker.
//! A call where every strategy fails counts as one breaker failure.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::breaker::{BreakerState, CircuitBreaker};
use super::cache::{CacheEntry, ResultCache};
use super::clock::{Clock, SystemClock};
use super::config::ResolverConfig;
use super::rate_limit::RateLimiter;
use super::store::StateStore;
use super::strategies::PositionStrategy;
use super::types::{LocateOptions, Resolution, ResolveError, Source, StrategyError};
use super::validate;

/// The resolver and the state it guards.
///
/// Breaker, cache and rate window each sit behind their own lock, held only
/// for the individual check or update and never across a provider call.
/// Two overlapping calls can therefore both miss the cache and both run the
/// chain; the last one to finish wins the cache and breaker writes.
pub struct LocationResolver {
    strategies: Vec<Box<dyn PositionStrategy>>,
    breaker: Mutex<CircuitBreaker>,
    cache: Mutex<ResultCache>,
    limiter: Mutex<RateLimiter>,
    clock: Arc<dyn Clock>,
    precision: u32,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocationResolver {
    /// Build a resolver over `strategies` (tried in the given order), loading
    /// breaker and cache state from `store`.
    pub fn new(
        strategies: Vec<Box<dyn PositionStrategy>>,
        store: Arc<dyn StateStore>,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            strategies,
            breaker: Mutex::new(CircuitBreaker::load(
                store.clone(),
                config.breaker_threshold,
                config.breaker_lock(),
            )),
            cache: Mutex::new(ResultCache::load(store, config.cache_ttl())),
            limiter: Mutex::new(RateLimiter::new(config.rate_window(), config.rate_burst)),
            clock: Arc::new(SystemClock),
            precision: config.precision_decimals,
        }
    }

    /// Replace the wall clock (for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn breaker_state(&self) -> BreakerState {
        lock(&self.breaker).state()
    }

    /// The cache entry as stored, regardless of age.
    pub fn cached(&self) -> Option<CacheEntry> {
        lock(&self.cache).peek().cloned()
    }

    /// Resolve the current position through the full pipeline.
    pub async fn get_current_location(&self, opts: LocateOptions) -> Result<Resolution, ResolveError> {
        let now = self.clock.now_ms();

        // 1. Breaker
        if let Err(remaining) = lock(&self.breaker).check(now) {
            let locked_until_ms = now + remaining.as_millis() as i64;
            debug!(remaining_ms = remaining.as_millis() as u64, "Circuit open, refusing request");
            return Err(ResolveError::CircuitOpen {
                remaining,
                locked_until_ms,
            });
        }

        // 2. Rate limiter
        if let Err(retry_after) = lock(&self.limiter).admit(now) {
            warn!(retry_after_ms = retry_after.as_millis() as u64, "Location request rate limited");
            return Err(ResolveError::RateLimited { retry_after });
        }

        // 3. Cache
        if !opts.force_refresh {
            if let Some(fix) = lock(&self.cache).get(now) {
                debug!(provider = %fix.provider, "Serving cached fix");
                return Ok(Resolution {
                    fix,
                    source: Source::Cache,
                });
            }
        }

        // 4. Strategies, in order
        let mut last_error: Option<StrategyError> = None;
        for strategy in &self.strategies {
            let name = strategy.name();
            let fix = match strategy.resolve().await {
                Ok(fix) => fix,
                Err(e) => {
                    info!(strategy = name, error = %e, "Strategy failed, trying next");
                    last_error = Some(e);
                    continue;
                }
            };

            // 5. Validate, desensitize, commit
            if let Err(reason) = validate::check(&fix) {
                warn!(strategy = name, reason = %reason, "Rejecting invalid fix");
                last_error = Some(StrategyError::InvalidCoordinates(reason));
                continue;
            }
            let fix = validate::desensitize(&fix, self.precision);

            let done = self.clock.now_ms();
            lock(&self.breaker).reset();
            lock(&self.cache).put(fix.clone(), done);
            info!(strategy = name, "Resolved position");
            return Ok(Resolution {
                fix,
                source: Source::Strategy(name.to_string()),
            });
        }

        // 6. Whole chain failed
        let failed_at = self.clock.now_ms();
        lock(&self.breaker).record_failure(failed_at);
        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no location strategies configured".into());
        warn!(attempts = self.strategies.len(), last_error = %last_error, "All location providers failed");
        Err(ResolveError::AllProvidersFailed {
            attempts: self.strategies.len(),
            last_error,
        })
    }
}
