//! Bounded retry with exponential backoff, plus cooperative cancellation.
//!
//! # Invariants
//! - Only `RemoteError::is_transient()` failures are retried.
//! - At most `max_attempts` calls are made; the last error is surfaced.
//! - A cancelled token stops the loop before the next attempt.

use super::{RemoteError, RemoteResult};
use log::warn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: u32 = 4;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

/// Shared flag a caller flips to abandon an in-flight sync.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(RemoteError::Cancelled)` once the token is cancelled.
    pub fn check(&self) -> RemoteResult<()> {
        if self.is_cancelled() {
            return Err(RemoteError::Cancelled);
        }
        Ok(())
    }
}

/// Retry schedule for remote transport calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Policy without waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    pub fn run<T>(
        &self,
        cancel: &CancelToken,
        operation: &str,
        mut op: impl FnMut() -> RemoteResult<T>,
    ) -> RemoteResult<T> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            cancel.check()?;
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "event=remote_retry module=remote status=retry operation={} attempt={}/{} delay_ms={} error={}",
                        operation,
                        attempt,
                        max_attempts,
                        delay.as_millis(),
                        err
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CancelToken, RetryPolicy};
    use crate::remote::RemoteError;
    use std::cell::Cell;
    use std::time::Duration;

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(350));
        assert_eq!(policy.delay_after(30), Duration::from_millis(350));
    }

    #[test]
    fn retries_transient_failures_until_success() {
        let calls = Cell::new(0);
        let result = RetryPolicy::immediate(3).run(&CancelToken::new(), "put", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(RemoteError::Transient("busy".to_string()))
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result.expect("third attempt should succeed"), 3);
    }

    #[test]
    fn surfaces_last_transient_error_after_bounded_attempts() {
        let calls = Cell::new(0);
        let err = RetryPolicy::immediate(2)
            .run(&CancelToken::new(), "put", || -> Result<(), _> {
                calls.set(calls.get() + 1);
                Err(RemoteError::Transient("busy".to_string()))
            })
            .expect_err("retries should be exhausted");
        assert!(err.is_transient());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        let calls = Cell::new(0);
        let err = RetryPolicy::immediate(5)
            .run(&CancelToken::new(), "get", || -> Result<(), _> {
                calls.set(calls.get() + 1);
                Err(RemoteError::Permanent("denied".to_string()))
            })
            .expect_err("permanent failure should surface");
        assert!(matches!(err, RemoteError::Permanent(_)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn cancelled_token_stops_before_first_attempt() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let calls = Cell::new(0);
        let err = RetryPolicy::immediate(3)
            .run(&cancel, "list", || {
                calls.set(calls.get() + 1);
                Ok(())
            })
            .expect_err("cancelled token should abort");
        assert!(matches!(err, RemoteError::Cancelled));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn clones_share_cancellation_state() {
        let cancel = CancelToken::new();
        let handle = cancel.clone();
        handle.cancel();
        assert!(cancel.is_cancelled());
    }
}
