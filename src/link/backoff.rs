//! Capped linear reconnect backoff.
//!
//! ```text
//!   failure:  interval = min(interval + step, ceiling)
//!   success:  interval = 0
//!   ready:    now - last_attempt >= interval
//! ```
//!
//! With the default 5 s step and 60 s ceiling, repeated failures produce
//! 5, 10, 15, ... 60, 60 s.  The interval only ever decreases through
//! [`Backoff::reset`].

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    step_ms: u32,
    ceiling_ms: u32,
    interval_ms: u32,
    last_attempt_ms: Option<u64>,
}

impl Backoff {
    pub fn new(step_ms: u32, ceiling_ms: u32) -> Self {
        Self {
            step_ms,
            ceiling_ms,
            interval_ms: 0,
            last_attempt_ms: None,
        }
    }

    /// Current wait between attempts.
    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn record_attempt(&mut self, now_ms: u64) {
        self.last_attempt_ms = Some(now_ms);
    }

    pub fn record_failure(&mut self) {
        self.interval_ms = self
            .interval_ms
            .saturating_add(self.step_ms)
            .min(self.ceiling_ms);
    }

    pub fn reset(&mut self) {
        self.interval_ms = 0;
    }

    /// Whether the next attempt may start at `now_ms`.
    pub fn ready(&self, now_ms: u64) -> bool {
        match self.last_attempt_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= u64::from(self.interval_ms),
        }
    }
}
