//! Bounded retry policy for eventually consistent storage reads

use std::time::Duration;

/// Retry policy applied to storage read operations.
///
/// Remote object stores may exhibit read-after-write lag, so reads are
/// attempted up to `attempts` times with `delay` between attempts. The
/// attempt count and the delay are configured independently; tests
/// substitute a near-zero-delay policy.
///
/// There is no cancellation token. A caller wanting an upper bound on
/// how long a read may block expresses it through this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub attempts: u32,

    /// Delay between consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// A single attempt with no waiting.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds or the policy is exhausted.
    ///
    /// Intermediate failures are logged at debug level; only the final
    /// failure is surfaced to the caller.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.attempts.max(1);
        let mut tried = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tried += 1;
                    if tried >= attempts {
                        return Err(err);
                    }
                    tracing::debug!("attempt {}/{} failed: {}, retrying", tried, attempts, err);
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(200),
        }
    }
}
