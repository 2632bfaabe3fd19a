//! Fixed-window request budget for the live API
//!
//! The window resets wholesale once it has elapsed, so a full burst is
//! possible right after a reset. Waiters are serialized by the async mutex.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::info;

/// Length of one budget window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Live API free tier: 10 calls per minute
pub const DEFAULT_BUDGET: u32 = 10;

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    request_count: u32,
    window_start: Instant,
}

/// Rate limiter bound to one API credential
#[derive(Debug)]
pub struct RateLimiter {
    budget: u32,
    window: Duration,
    state: Mutex<RateLimitWindow>,
}

impl RateLimiter {
    pub fn new(budget: u32, window: Duration) -> Self {
        Self {
            budget: budget.max(1),
            window,
            state: Mutex::new(RateLimitWindow {
                request_count: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// `budget` calls per rolling minute
    pub fn per_minute(budget: u32) -> Self {
        Self::new(budget, DEFAULT_WINDOW)
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Wait until a slot is free in the current window, then take it.
    /// Never fails; only delays.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        if now.duration_since(state.window_start) >= self.window {
            state.request_count = 0;
            state.window_start = now;
        }

        if state.request_count >= self.budget {
            let wait = self
                .window
                .saturating_sub(now.duration_since(state.window_start));
            info!("Rate limit reached. Waiting {}ms...", wait.as_millis());
            tokio::time::sleep(wait).await;
            state.request_count = 0;
            state.window_start = Instant::now();
        }

        state.request_count += 1;
    }

    /// Current (request_count, window_start)
    pub async fn snapshot(&self) -> (u32, Instant) {
        let state = self.state.lock().await;
        (state.request_count, state.window_start)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::per_minute(DEFAULT_BUDGET)
    }
}
