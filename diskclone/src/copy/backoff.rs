use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::warn;

/// Exponential delay with an additive random jitter, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter: Duration) -> Self {
        Self { base, max, jitter }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let mut rng = rand::thread_rng();
        self.delay_with_rng(attempt, &mut rng)
    }

    pub fn delay_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base_ms = self.base.as_millis().min(u128::from(u64::MAX)) as u64;
        let max_ms = self.max.as_millis().min(u128::from(u64::MAX)) as u64;
        let jitter_ms = self.jitter.as_millis().min(u128::from(u64::MAX)) as u64;
        let shift = attempt.min(16);
        let exp = base_ms.saturating_mul(1u64 << shift);
        let noise = if jitter_ms == 0 {
            0
        } else {
            rng.gen_range(0..=jitter_ms)
        };
        Duration::from_millis(exp.saturating_add(noise).min(max_ms))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first call; the operation runs at most
    /// `max_attempts + 1` times.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// No retries and no sleeping.
    pub fn none() -> Self {
        Self::new(0, Backoff::new(Duration::ZERO, Duration::ZERO, Duration::ZERO))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            5,
            Backoff::new(
                Duration::from_secs(1),
                Duration::from_secs(32),
                Duration::from_secs(1),
            ),
        )
    }
}

#[derive(Debug, Error)]
#[error("{operation} gave up after {attempts} attempts: {source}")]
pub struct RetryExhausted<E: std::error::Error + 'static> {
    pub operation: &'static str,
    pub attempts: u32,
    #[source]
    pub source: E,
}

/// Runs `op` until it succeeds or the policy's attempt ceiling is reached.
///
/// Every error is treated as transient. The last error is returned wrapped in
/// [`RetryExhausted`].
pub async fn retry<T, E, Op, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut op: Op,
) -> Result<T, RetryExhausted<E>>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts => {
                let delay = policy.backoff.delay(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "remote call failed; backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(source) => {
                return Err(RetryExhausted {
                    operation,
                    attempts: attempt + 1,
                    source,
                });
            }
        }
    }
}
