//! Sliding-window request limiter.

use std::collections::VecDeque;
use std::time::Duration;

/// Admits at most `burst` calls in any trailing `window`.
#[derive(Debug)]
pub struct RateLimiter {
    window_ms: i64,
    burst: usize,
    hits: VecDeque<i64>,
}

impl RateLimiter {
    pub fn new(window: Duration, burst: usize) -> Self {
        Self {
            window_ms: window.as_millis() as i64,
            burst,
            hits: VecDeque::with_capacity(burst),
        }
    }

    /// Admit or deny a call at `now_ms`. On denial, returns how long until the
    /// oldest recorded call leaves the window.
    pub fn admit(&mut self, now_ms: i64) -> Result<(), Duration> {
        self.prune(now_ms);
        if self.hits.len() < self.burst {
            self.hits.push_back(now_ms);
            return Ok(());
        }
        let oldest = self.hits.front().copied().unwrap_or(now_ms);
        let wait = (oldest + self.window_ms - now_ms).max(0) as u64;
        Err(Duration::from_millis(wait))
    }

    fn prune(&mut self, now_ms: i64) {
        while let Some(&t) = self.hits.front() {
            if now_ms - t >= self.window_ms {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Duration::from_secs(60), 5)
    }

    #[test]
    fn test_sixth_call_denied() {
        let mut rl = limiter();
        for i in 0..5 {
            assert!(rl.admit(i * 1_000).is_ok());
        }
        assert_eq!(rl.admit(10_000), Err(Duration::from_millis(50_000)));
        assert_eq!(rl.hits.len(), 5);
    }

    #[test]
    fn test_admits_after_window_from_first_call() {
        let mut rl = limiter();
        for i in 0..5 {
            rl.admit(i * 1_000).unwrap();
        }
        assert!(rl.admit(59_999).is_err());
        assert!(rl.admit(60_000).is_ok());
        // Call 2 at t=1000 is still inside the window
        assert!(rl.admit(60_500).is_err());
    }

    #[test]
    fn test_denied_calls_do_not_count() {
        let mut rl = limiter();
        for _ in 0..5 {
            rl.admit(0).unwrap();
        }
        for _ in 0..20 {
            assert!(rl.admit(30_000).is_err());
        }
        assert_eq!(rl.hits.len(), 5);
        assert!(rl.admit(60_000).is_ok());
    }
}
