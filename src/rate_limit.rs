//! In-memory rate limiting for access-code requests.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<String, VecDeque<Instant>>`,
//! keyed by normalized email. A key is allowed `limit` requests within any
//! `window`; older timestamps are pruned on each check. Empty deques are
//! dropped so the map does not grow with every address ever seen.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::ErrorCode;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("too many requests (max {limit} per {window_secs}s)")]
pub struct RateLimitError {
    pub limit: usize,
    pub window_secs: u64,
}

impl ErrorCode for RateLimitError {
    fn error_code(&self) -> &'static str {
        "E_RATE_LIMITED"
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    limit: usize,
    window: Duration,
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: usize, window: Duration) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), limit, window }
    }

    /// Check the key's window, then record the request.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError`] when the key is over its limit; nothing is recorded.
    pub fn check_and_record(&self, key: &str) -> Result<(), RateLimitError> {
        self.check_and_record_at(key, Instant::now())
    }

    fn check_and_record_at(&self, key: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        inner.retain(|_, deque| {
            prune_window(deque, now, self.window);
            !deque.is_empty()
        });

        let deque = inner.entry(key.to_owned()).or_default();
        if deque.len() >= self.limit {
            return Err(RateLimitError { limit: self.limit, window_secs: self.window.as_secs() });
        }
        deque.push_back(now);
        Ok(())
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
