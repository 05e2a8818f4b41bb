//! Smoothed rate limiting for delivery attempts.
//!
//! A token bucket with continuous refill and a capacity of one token, so
//! the sustained rate is enforced between any two acquisitions rather than
//! per calendar second. The configured rate must sit strictly below the
//! provider's advertised ceiling to absorb measurement-window skew.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Token-issuing gate bounding the sustained delivery rate.
///
/// `acquire` always eventually succeeds; there is no timeout or
/// cancellation. Blocked callers are released in FIFO order.
pub struct RateLimiter {
    state: Mutex<BucketState>,
    rate_per_sec: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    /// Refill from elapsed time, capped at one token of burst.
    fn refill(&mut self, rate_per_sec: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate_per_sec).min(1.0);
        self.last_refill = now;
    }
}

impl RateLimiter {
    /// Create a limiter issuing `rate_per_sec` tokens per second.
    pub fn new(rate_per_sec: f64) -> Self {
        let rate_per_sec = rate_per_sec.max(0.001);
        Self {
            state: Mutex::new(BucketState {
                tokens: 1.0,
                last_refill: Instant::now(),
            }),
            rate_per_sec,
        }
    }

    /// Block until issuing a token stays within the configured rate.
    ///
    /// The bucket lock is held across the wait; the tokio mutex queues
    /// waiters fairly, which gives FIFO release order.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        state.refill(self.rate_per_sec);

        if state.tokens < 1.0 {
            let deficit = 1.0 - state.tokens;
            let wait = Duration::from_secs_f64(deficit / self.rate_per_sec);
            tokio::time::sleep(wait).await;
            state.refill(self.rate_per_sec);
        }

        state.tokens -= 1.0;
    }
}
