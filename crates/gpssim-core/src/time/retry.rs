//! Deadline-bounded retry policy
//!
//! Used for network candidate connection waits and network time retrieval.

use super::clock::MonotonicClock;
use std::time::Duration;

/// Retry an operation at a fixed interval until it succeeds or time runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total time budget measured from the first attempt
    pub deadline: Duration,
    /// Pause between attempts
    pub interval: Duration,
    /// Optional cap on the number of attempts
    pub max_attempts: Option<u32>,
}

/// Every attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub elapsed: Duration,
    pub last_error: Option<E>,
}

impl RetryPolicy {
    pub fn new(deadline: Duration, interval: Duration) -> Self {
        Self {
            deadline,
            interval,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Run `attempt` until it returns `Ok`
    ///
    /// The closure receives the time left before the deadline. At least one
    /// attempt is always made.
    pub fn run<T, E>(
        &self,
        clock: &dyn MonotonicClock,
        mut attempt: impl FnMut(Duration) -> Result<T, E>,
    ) -> Result<T, RetryExhausted<E>> {
        let start = clock.now_ms();
        let elapsed = || Duration::from_millis(clock.now_ms().saturating_sub(start));
        let mut attempts = 0u32;
        let mut last_error = None;

        loop {
            attempts += 1;
            let remaining = self.deadline.saturating_sub(elapsed());
            match attempt(remaining) {
                Ok(value) => return Ok(value),
                Err(e) => last_error = Some(e),
            }

            let spent = elapsed();
            let out_of_attempts = self.max_attempts.is_some_and(|max| attempts >= max);
            if spent >= self.deadline || out_of_attempts {
                return Err(RetryExhausted {
                    attempts,
                    elapsed: spent,
                    last_error,
                });
            }

            // A zero interval on a clock that does not move would spin forever
            let pause = self.interval.max(Duration::from_millis(1));
            clock.sleep(pause.min(self.deadline - spent));
        }
    }

    /// Poll `condition` until it holds or the deadline passes
    pub fn wait_until(&self, clock: &dyn MonotonicClock, mut condition: impl FnMut() -> bool) -> bool {
        self.run(clock, |_| if condition() { Ok(()) } else { Err(()) })
            .is_ok()
    }
}
