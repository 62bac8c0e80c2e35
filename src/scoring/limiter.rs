// src/scoring/limiter.rs
//! Request pacing for the scoring service.
//!
//! Permits are evenly spaced at the per-worker budget (global ceiling
//! divided by worker count). A caller over budget waits for its slot;
//! nothing is ever refused or dropped.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    pub fn per_minute(budget: u32) -> Self {
        let budget = budget.max(1);
        Self {
            interval: Duration::from_secs_f64(60.0 / f64::from(budget)),
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Waits until this caller's slot comes up. The first caller passes
    /// immediately; each subsequent one is spaced `60s / budget` apart.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = (*next).max(now);
            *next = slot + self.interval;
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}
