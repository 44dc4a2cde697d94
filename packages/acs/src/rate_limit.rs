//! Sliding-window admission control shared by every in-flight request.
//!
//! At most `capacity` requests are admitted in any `window`-long interval.
//! Waiters sleep until the oldest admission leaves the window instead of
//! polling.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::RateLimitConfig;

static PROCESS_WIDE: OnceLock<Arc<RateLimiter>> = OnceLock::new();

/// Limits request admissions to `capacity` per sliding `window`.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: usize,
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// A limiter admitting `capacity` requests per `window`.
    ///
    /// A zero capacity is treated as one.
    #[must_use]
    pub fn new(capacity: usize, window: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            window,
            admitted: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// A limiter built from configuration.
    #[must_use]
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    /// The limiter shared by every client in this process.
    ///
    /// Created from `config` on first use; later calls return the same
    /// limiter regardless of their `config`.
    #[must_use]
    pub fn process_wide(config: &RateLimitConfig) -> Arc<Self> {
        Arc::clone(PROCESS_WIDE.get_or_init(|| {
            log::debug!(
                "Creating process-wide rate limiter: {} requests per {:?}",
                config.max_requests,
                config.window()
            );
            Arc::new(Self::from_config(config))
        }))
    }

    /// Requests admitted per window.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Waits until a request may be sent, then records the admission.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire() {
                Ok(()) => return,
                Err(ready_at) => {
                    log::trace!("Rate limit reached, waiting until {ready_at:?}");
                    tokio::time::sleep_until(ready_at).await;
                }
            }
        }
    }

    /// Admits a request now if the window has room.
    ///
    /// # Errors
    ///
    /// Returns the instant at which the oldest admission leaves the window
    /// when the limiter is full.
    pub fn try_acquire(&self) -> Result<(), Instant> {
        let now = Instant::now();
        let mut admitted = self
            .admitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        while admitted
            .front()
            .is_some_and(|oldest| *oldest + self.window <= now)
        {
            admitted.pop_front();
        }

        if admitted.len() < self.capacity {
            admitted.push_back(now);
            return Ok(());
        }

        Err(admitted
            .front()
            .map_or(now + self.window, |oldest| *oldest + self.window))
    }
}
