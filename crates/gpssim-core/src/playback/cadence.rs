//! Fixed-period tick cadence

use std::time::Duration;

/// Deadline tracker for a fixed period
///
/// Each due tick moves the deadline forward by exactly one period so the
/// rate does not drift with processing time. When the loop falls more than a
/// period behind, the deadline re-anchors to now instead of bursting to catch up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    period_ms: u64,
    next_due_ms: u64,
}

impl Cadence {
    /// First tick due at `start_ms`
    pub fn new(period: Duration, start_ms: u64) -> Self {
        Self {
            period_ms: (period.as_millis() as u64).max(1),
            next_due_ms: start_ms,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn next_due_ms(&self) -> u64 {
        self.next_due_ms
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms >= self.next_due_ms
    }

    /// Consume a due tick; returns false (and does nothing) if not yet due
    pub fn try_advance(&mut self, now_ms: u64) -> bool {
        if !self.is_due(now_ms) {
            return false;
        }
        self.next_due_ms += self.period_ms;
        if self.next_due_ms <= now_ms {
            tracing::debug!(
                behind_ms = now_ms - self.next_due_ms,
                "Tick cadence fell behind, re-anchoring"
            );
            self.next_due_ms = now_ms + self.period_ms;
        }
        true
    }

    /// Time until the next tick is due
    pub fn remaining(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.next_due_ms.saturating_sub(now_ms))
    }
}
