//! Fixed-delay write throttle.
//!
//! The profile store is rate limited; after every successful create or
//! update the pipeline waits `interval` before issuing the next call. Events
//! process skills sequentially, so this caps one event's write rate at one
//! write per `interval`.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteThrottle {
    interval: Duration,
}

impl WriteThrottle {
    pub fn fixed(interval: Duration) -> Self {
        Self { interval }
    }

    /// No pause at all.
    pub fn disabled() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn pause(&self) {
        if self.interval.is_zero() {
            return;
        }
        tracing::debug!("sleeping for {} ms", self.interval.as_millis());
        tokio::time::sleep(self.interval).await;
    }
}
