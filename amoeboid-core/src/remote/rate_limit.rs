//! Outbound request spacing
//!
//! A leaky bucket with capacity one: every caller reserves the next free slot
//! under a short lock and then sleeps until that slot outside of it, so
//! concurrent requests queue for slots without blocking each other's I/O.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
pub struct RateLimiter {
    spacing: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_slot: Mutex::new(None),
        }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Wait for permission to issue one outbound call
    ///
    /// The permit is consumed on return; the slot is released automatically
    /// once `spacing` has elapsed.
    pub async fn acquire(&self) {
        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next_slot {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next_slot = Some(slot + self.spacing);
            slot
        };

        let now = Instant::now();
        if slot > now {
            debug!(wait_ms = (slot - now).as_millis() as u64, "Spacing catalog request");
            tokio::time::sleep_until(slot).await;
        }
    }
}
