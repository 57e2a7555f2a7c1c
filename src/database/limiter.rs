//! Adaptive Rate Limiter
//!
//! Throttles full rebuilds during bursts of change notifications.
//!
//! Every request is timestamped into a sliding window. A request is allowed
//! when the window's frequency does not exceed the current threshold. The
//! threshold halves while the frequency is above the busy cutoff and doubles
//! otherwise, staying within `[min_rate, max_rate]`.

use std::collections::VecDeque;
use std::time::Duration;

use log::debug;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

#[derive(Debug, Clone)]
pub struct RateLimiter {
    window: Duration,
    max_rate: f64,
    min_rate: f64,
    busy_rate: f64,
    threshold: f64,
    requests: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: Duration::from_millis(config.window_ms.max(1)),
            max_rate: config.max_rate,
            min_rate: config.min_rate,
            busy_rate: config.busy_rate,
            threshold: config.max_rate,
            requests: VecDeque::new(),
        }
    }

    /// Records a request made now and decides whether it may proceed.
    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Records a request made at `now` and decides whether it may proceed.
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        self.requests.push_back(now);
        while let Some(&oldest) = self.requests.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.requests.pop_front();
            } else {
                break;
            }
        }

        let frequency = self.frequency();
        let allowed = frequency <= self.threshold;

        if frequency > self.busy_rate {
            self.threshold = (self.threshold / 2.0).max(self.min_rate);
        } else {
            self.threshold = (self.threshold * 2.0).min(self.max_rate);
        }

        debug!(
            "Rate limiter: {:.2} req/s, threshold now {:.2}, {}",
            frequency,
            self.threshold,
            if allowed { "allowed" } else { "refused" }
        );
        allowed
    }

    /// Requests per second over the current window.
    pub fn frequency(&self) -> f64 {
        self.requests.len() as f64 / self.window.as_secs_f64()
    }

    /// Current allowed frequency.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimitConfig::default())
    }
}
