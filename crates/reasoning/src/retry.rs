use std::future::Future;
use std::time::Duration;

use crate::error::{Result, ServiceError};

/// Capped exponential backoff: `min(cap, base * 2^(attempt - 1))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
  pub base: Duration,
  pub cap: Duration,
}

impl Backoff {
  pub fn new(base: Duration, cap: Duration) -> Self {
    Self { base, cap }
  }

  /// No waiting between attempts. Handy in tests.
  pub fn none() -> Self {
    Self { base: Duration::ZERO, cap: Duration::ZERO }
  }

  /// Delay after the `attempt`-th failure (1-based).
  pub fn delay(&self, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    self.base.saturating_mul(factor).min(self.cap)
  }
}

/// Bounds every outbound network call: a per-attempt timeout, a total attempt
/// count and the wait between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub timeout: Duration,
  pub backoff: Backoff,
}

impl RetryPolicy {
  pub fn new(max_attempts: u32, timeout: Duration, backoff: Backoff) -> Self {
    Self { max_attempts: max_attempts.max(1), timeout, backoff }
  }

  /// Run `op` until it succeeds, fails with a non-retryable error, or runs out
  /// of attempts. An attempt that exceeds the timeout counts as a transient
  /// failure.
  pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let attempts = self.max_attempts.max(1);
    let mut attempt = 1;

    loop {
      let result = match tokio::time::timeout(self.timeout, op()).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::transient(format!(
          "{label} timed out after {}s",
          self.timeout.as_secs_f32()
        ))),
      };

      match result {
        Ok(value) => return Ok(value),
        Err(error) if error.is_retryable() && attempt < attempts => {
          let delay = self.backoff.delay(attempt);
          bentley::warn!(
            "{label}: attempt {attempt}/{attempts} failed: {error}; retrying in {}ms",
            delay.as_millis()
          );
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        Err(error) => {
          if error.is_retryable() {
            bentley::error!("{label}: giving up after {attempt} attempts: {error}");
          }
          return Err(error);
        }
      }
    }
  }
}
