use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Backoff for idempotent node reads (`eth_call`, balances, nonces, gas price).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, the first one included. `1` disables retrying.
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
            max_delay: base_delay.saturating_mul(16),
            ..Default::default()
        }
    }

    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before retry number `retry` (0-based): doubles each time, capped.
    fn backoff(&self, retry: u32) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay);
        if self.jitter && !delay.is_zero() {
            delay.mul_f64(rand::thread_rng().gen_range(0.5..=1.5))
        } else {
            delay
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non-transient error, or
/// runs out of attempts. The last error is returned unchanged.
///
/// Never wrap a transaction submission in this.
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                let message = e.to_string();
                if attempt >= config.attempts || !is_transient_message(&message) {
                    return Err(e);
                }
                let delay = config.backoff(attempt - 1);
                debug!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    operation_name, attempt, config.attempts, delay, message
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Whether an RPC/HTTP error message looks worth another attempt.
pub fn is_transient_message(message: &str) -> bool {
    let message = message.to_lowercase();

    let transient_patterns = [
        "timeout",
        "timed out",
        "connection refused",
        "connection reset",
        "network error",
        "temporary failure",
        "service unavailable",
        "bad gateway",
        "rate limited",
        "too many requests",
        "429",
        "header not found",
    ];

    transient_patterns
        .iter()
        .any(|pattern| message.contains(pattern))
}
