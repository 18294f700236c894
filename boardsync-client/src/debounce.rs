//! Merge debouncing for the real-time event stream.
//!
//! Bursts of change events (a reassignment fans out an upsert and a
//! notice, a bulk edit produces several upserts) would otherwise trigger
//! a mirror merge and re-render per event. The debouncer enforces a
//! minimum gap between merges: each event still gets its own merge, in
//! arrival order, but a merge that would land inside the window sleeps
//! until the window since the previous merge has elapsed. Nothing is
//! dropped and nothing is reordered.
//!
//! Built on `tokio::time` so tests can drive it with a paused clock.

use std::time::Duration;
use tokio::time::Instant;

/// Default gap between consecutive mirror merges.
pub const DEFAULT_MERGE_WINDOW: Duration = Duration::from_millis(500);

/// Rate limiter for sequential event processing.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last_merge: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_merge: None,
        }
    }

    /// Waits until at least `window` has passed since the previous call
    /// returned, then stamps the current merge. The first call never waits.
    pub async fn throttle(&mut self) {
        if let Some(last) = self.last_merge {
            let elapsed = last.elapsed();
            if elapsed < self.window {
                tokio::time::sleep(self.window - elapsed).await;
            }
        }
        self.last_merge = Some(Instant::now());
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_MERGE_WINDOW)
    }
}
