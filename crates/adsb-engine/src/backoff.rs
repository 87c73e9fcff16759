//! Exponential backoff for the snapshot poll.
//!
//! A failed poll means "no snapshot this tick". Consecutive failures push the
//! next attempt further out so an outage does not turn into a log storm.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

const JITTER_RATIO: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct PollBackoff {
    base: Duration,
    max: Duration,
    current: Duration,
    consecutive_failures: u32,
    next_attempt_at: Instant,
}

impl PollBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        Self {
            base,
            max: max.max(base),
            current: base,
            consecutive_failures: 0,
            next_attempt_at: Instant::now(),
        }
    }

    pub fn ready(&self) -> bool {
        Instant::now() >= self.next_attempt_at
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// A poll succeeded.
    pub fn reset(&mut self) {
        self.current = self.base;
        self.consecutive_failures = 0;
        self.next_attempt_at = Instant::now();
    }

    /// A poll failed. Returns how long to wait before the next attempt.
    pub fn fail(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.current = self.current.saturating_mul(2).min(self.max);
        let delay = with_jitter(self.current);
        self.next_attempt_at = Instant::now() + delay;
        delay
    }
}

fn with_jitter(delay: Duration) -> Duration {
    let max_jitter_ms = (delay.as_millis() as f64 * JITTER_RATIO) as u64;
    if max_jitter_ms == 0 {
        return delay;
    }
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0);
    delay + Duration::from_millis(seed % (max_jitter_ms + 1))
}
