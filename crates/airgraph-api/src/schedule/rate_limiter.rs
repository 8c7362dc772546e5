//! Request pacing for the schedule API.

use std::time::{Duration, Instant};

/// Enforces a minimum interval between consecutive requests.
#[derive(Debug)]
pub struct RequestPacer {
    /// Minimum interval between requests.
    min_interval: Duration,
    /// Last request timestamp.
    last_request: Option<Instant>,
}

impl RequestPacer {
    /// Creates a new pacer.
    pub(crate) const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Waits until the next request is allowed, then records it.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval.saturating_sub(elapsed)).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}
