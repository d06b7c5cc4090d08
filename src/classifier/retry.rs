use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Exponential backoff: no wait before the first attempt, then
/// `base_delay * 2^(n-2)` before attempt `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay", with = "millis", rename = "base_delay_ms")]
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_attempts(),
            base_delay: default_base_delay(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Wait before 1-based attempt `attempt`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(1000)
}

/// Last error together with how many attempts were made.
#[derive(Debug)]
pub struct Attempted<E> {
    pub attempts: u32,
    pub error: E,
}

/// Run `operation` until it succeeds, returns a non-retryable error, or the
/// policy's attempt budget is spent.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, Attempted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !is_retryable(&error) || attempt >= max_attempts {
                    return Err(Attempted {
                        attempts: attempt,
                        error,
                    });
                }
                warn!(
                    "Attempt {}/{} failed, retrying in {:?}: {}",
                    attempt,
                    max_attempts,
                    policy.delay_before(attempt + 1),
                    error
                );
                attempt += 1;
            }
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
