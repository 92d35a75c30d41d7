//! Exponential backoff policy for connection attempts.

use std::time::Duration;

/// Retry policy: wait `initial * multiplier^n` after the n+1-th consecutive
/// failure, never longer than `max`.
///
/// With `max_attempts: None` the policy never gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub multiplier: u32,
    pub max: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            multiplier: 2,
            max: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

/// Returned when a bounded policy runs out of attempts.
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl Backoff {
    /// Delay before the next attempt after `failures` consecutive failures.
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1);
        let factor = self.multiplier.checked_pow(exponent).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Whether `attempts` failed attempts exhaust the policy.
    pub fn exhausted(&self, attempts: u32) -> bool {
        matches!(self.max_attempts, Some(max) if attempts >= max)
    }

    /// Run `op` until it succeeds or the policy is exhausted.
    ///
    /// `op` receives the 1-based attempt number. `sleep` is called with the
    /// delay between attempts.
    pub fn retry<T, E, F, S>(&self, mut op: F, mut sleep: S) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Result<T, E>,
        S: FnMut(Duration),
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match op(attempts) {
                Ok(value) => return Ok(value),
                Err(last_error) if self.exhausted(attempts) => {
                    return Err(RetryError {
                        attempts,
                        last_error,
                    })
                }
                Err(_) => sleep(self.delay(attempts)),
            }
        }
    }
}
