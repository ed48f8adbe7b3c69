//! Client-side sliding-window rate limiter with a general and a generation tier.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    /// How long until the oldest blocking record leaves the window.  `None`
    /// when allowed.
    pub retry_after: Option<Duration>,
}

impl Admission {
    const ALLOWED: Admission = Admission {
        allowed: true,
        retry_after: None,
    };

    fn denied(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after),
        }
    }
}

#[derive(Debug, Default)]
struct Windows {
    general: VecDeque<Instant>,
    generation: VecDeque<Instant>,
}

/// Two trailing windows of admitted-request timestamps.
///
/// Every generation record is also a general record, so the generation
/// window is always a subset of the general one.
#[derive(Debug)]
pub struct RateLimiter {
    general_limit: usize,
    generation_limit: usize,
    window: Duration,
    state: Mutex<Windows>,
}

impl RateLimiter {
    /// # Panics
    /// If `window` is zero.
    pub fn new(general_limit: usize, generation_limit: usize, window: Duration) -> Self {
        assert!(!window.is_zero(), "rate limit window must be non-zero");
        Self {
            general_limit,
            generation_limit,
            window,
            state: Mutex::new(Windows::default()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.general_limit, config.generation_limit, config.window())
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn can_make_general_request(&self) -> Admission {
        let now = Instant::now();
        let state = self.lock_evicted(now);
        self.check_general(&state, now)
    }

    /// General tier first, then the generation tier.
    pub fn can_make_generation_request(&self) -> Admission {
        let now = Instant::now();
        let state = self.lock_evicted(now);
        let general = self.check_general(&state, now);
        if !general.allowed {
            return general;
        }
        if state.generation.len() < self.generation_limit {
            return Admission::ALLOWED;
        }
        Admission::denied(self.wait_for(state.generation.front(), now))
    }

    pub fn record_general_request(&self) {
        let now = Instant::now();
        let mut state = self.lock_evicted(now);
        state.general.push_back(now);
    }

    /// Counts against both tiers.
    pub fn record_generation_request(&self) {
        let now = Instant::now();
        let mut state = self.lock_evicted(now);
        state.general.push_back(now);
        state.generation.push_back(now);
    }

    pub fn reset(&self) {
        let mut state = self.lock();
        state.general.clear();
        state.generation.clear();
        log::info!("rate limiter reset");
    }

    pub fn general_count(&self) -> usize {
        self.lock_evicted(Instant::now()).general.len()
    }

    pub fn generation_count(&self) -> usize {
        self.lock_evicted(Instant::now()).generation.len()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, Windows> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_evicted(&self, now: Instant) -> MutexGuard<'_, Windows> {
        let mut state = self.lock();
        let window = self.window;
        let expired = |t: &Instant| now.saturating_duration_since(*t) >= window;
        while state.general.front().is_some_and(expired) {
            state.general.pop_front();
        }
        while state.generation.front().is_some_and(expired) {
            state.generation.pop_front();
        }
        state
    }

    fn check_general(&self, state: &Windows, now: Instant) -> Admission {
        if state.general.len() < self.general_limit {
            return Admission::ALLOWED;
        }
        Admission::denied(self.wait_for(state.general.front(), now))
    }

    fn wait_for(&self, oldest: Option<&Instant>, now: Instant) -> Duration {
        oldest
            .map(|t| self.window.saturating_sub(now.saturating_duration_since(*t)))
            .unwrap_or(self.window)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
