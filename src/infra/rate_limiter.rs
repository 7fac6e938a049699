use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::constants::RATE_WINDOW_SECS;

/// Sliding-window admission control: at most `max_requests` admissions in any trailing window.
///
/// Denied attempts are not recorded, so a caller hammering a full window does not extend it.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_requests_per_minute: usize) -> Self {
        Self::with_window(max_requests_per_minute, Duration::from_secs(RATE_WINDOW_SECS))
    }

    pub fn with_window(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: VecDeque::with_capacity(max_requests),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Admit a request now. Returns false without recording when the window is full.
    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    pub fn admit_at(&mut self, now: Instant) -> bool {
        self.prune(now);
        if self.timestamps.len() >= self.max_requests {
            warn!(limit = self.max_requests, "Rate limit exceeded");
            return false;
        }
        self.timestamps.push_back(now);
        true
    }

    /// Admissions still inside the window as of `now`.
    pub fn in_window(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.timestamps.len()
    }

    pub fn clear(&mut self) {
        self.timestamps.clear();
    }

    // Timestamps are pushed in order, so stale ones are always at the front
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}
