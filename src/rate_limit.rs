//! Minimum-interval gate between successive calls of one category.
//!
//! Built on `tokio::time`, so tests can drive it with a paused clock.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

pub struct RateLimiter {
    name: &'static str,
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, min_interval: Duration) -> Self {
        Self {
            name,
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Wait until at least `min_interval` has passed since the previous call
    pub async fn wait(&self) {
        let deadline = {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            let next = match *last {
                Some(prev) => (prev + self.min_interval).max(now),
                None => now,
            };
            *last = Some(next);
            next
        };
        if deadline > Instant::now() {
            log::debug!("[{}] waiting {:?}", self.name, deadline - Instant::now());
            sleep_until(deadline).await;
        }
    }
}
