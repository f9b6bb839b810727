//! Sliding-window rate limiter for generator calls.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::SynthesisError;

/// Allows at most `max_calls` acquisitions in any rolling `window`.
/// Exceeding the limit fails immediately instead of waiting.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            calls: Mutex::new(VecDeque::with_capacity(max_calls.min(64))),
        }
    }

    /// A limiter that never rejects.
    pub fn unlimited() -> Self {
        Self::new(usize::MAX, Duration::ZERO)
    }

    pub fn try_acquire(&self) -> Result<(), SynthesisError> {
        self.try_acquire_at(Instant::now())
    }

    /// [`RateLimiter::try_acquire`] with an explicit clock reading.
    pub fn try_acquire_at(&self, now: Instant) -> Result<(), SynthesisError> {
        if self.max_calls == usize::MAX {
            return Ok(());
        }
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        while let Some(&oldest) = calls.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                calls.pop_front();
            } else {
                break;
            }
        }
        if calls.len() >= self.max_calls {
            debug!(max_calls = self.max_calls, window = ?self.window, "rate limit exceeded");
            return Err(SynthesisError::RateLimited);
        }
        calls.push_back(now);
        Ok(())
    }

    /// Calls remaining in the current window.
    pub fn remaining_at(&self, now: Instant) -> usize {
        let calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        let live = calls
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) < self.window)
            .count();
        self.max_calls.saturating_sub(live)
    }
}
