//! Sliding-window request limiting.
//!
//! `RateLimiter` is a single window (the client session limiter);
//! `KeyedRateLimiter` keeps one window per caller for the HTTP boundary.
//! Both are plain owned values; callers decide where they live.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

impl RateLimitConfig {
    /// Run starts allowed per client session.
    pub const CLIENT: Self = Self {
        max_requests: 3,
        window: Duration::from_secs(60),
    };

    /// Requests allowed per caller at the HTTP boundary.
    pub const SERVER: Self = Self {
        max_requests: 10,
        window: Duration::from_secs(60),
    };
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    hits: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            hits: VecDeque::new(),
        }
    }

    /// Records a request and returns whether it was allowed. Rejected
    /// requests are not recorded.
    pub fn check(&mut self) -> bool {
        self.check_at(Instant::now())
    }

    pub fn check_at(&mut self, now: Instant) -> bool {
        self.prune(now);
        if self.hits.len() >= self.config.max_requests {
            return false;
        }
        self.hits.push_back(now);
        true
    }

    /// Time until the next request would be allowed; zero if it would be now.
    pub fn retry_after(&mut self) -> Duration {
        self.retry_after_at(Instant::now())
    }

    pub fn retry_after_at(&mut self, now: Instant) -> Duration {
        self.prune(now);
        if self.hits.len() < self.config.max_requests {
            return Duration::ZERO;
        }
        self.hits
            .front()
            .map(|oldest| (*oldest + self.config.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    pub fn reset(&mut self) {
        self.hits.clear();
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.hits.front() {
            if now.saturating_duration_since(*oldest) >= self.config.window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.hits.is_empty()
    }
}

/// One sliding window per caller key.
#[derive(Debug)]
pub struct KeyedRateLimiter {
    config: RateLimitConfig,
    windows: HashMap<String, RateLimiter>,
}

impl KeyedRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: HashMap::new(),
        }
    }

    /// `Err(retry_after)` when `key` has exhausted its window.
    pub fn check(&mut self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&mut self, key: &str, now: Instant) -> Result<(), Duration> {
        // Drop windows that have fully expired so the map stays bounded.
        self.windows.retain(|_, limiter| {
            limiter.prune(now);
            !limiter.is_idle()
        });

        let config = self.config;
        let limiter = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| RateLimiter::new(config));
        if limiter.check_at(now) {
            Ok(())
        } else {
            Err(limiter.retry_after_at(now))
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Whole seconds to wait, rounded up, never below one.
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

/// User-facing message for a rejected run.
pub fn rate_limit_message(wait: Duration) -> String {
    format!(
        "요청이 너무 많습니다. {}초 후에 다시 시도해주세요.",
        retry_after_secs(wait)
    )
}
