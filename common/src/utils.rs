use std::{future::Future, time::Duration};

use log::{debug, warn};
use rand::Rng;

/// Bounded exponential backoff with uniform jitter.
///
/// Attempt `i` (1-based) sleeps `min(max_delay, base * 2^(i-1))` plus a
/// uniform draw in `[0, jitter)` so synchronized retries spread out.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return backoff;
        }
        let drawn = rand::thread_rng().gen_range(0..jitter_ms);
        backoff + Duration::from_millis(drawn)
    }

    /// Run `operation` until it succeeds, a non-retryable error surfaces, or
    /// the attempt budget is exhausted. `retryable` classifies errors.
    pub async fn run<T, E, F, Fut, C>(
        &self,
        operation_name: &str,
        mut operation: F,
        retryable: C,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.max_attempts && retryable(&error) => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        operation_name, attempt, self.max_attempts, delay, error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    debug!(
                        "{} giving up after attempt {}: {}",
                        operation_name, attempt, error
                    );
                    return Err(error);
                }
            }
        }
    }
}

// Format a smallest-unit amount with the token's decimals, e.g. 5000 with
// 6 decimals becomes "0.005000"
pub fn format_units(amount: u64, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let divisor = 10u128.pow(decimals as u32);
    let whole = amount as u128 / divisor;
    let fraction = amount as u128 % divisor;
    format!(
        "{}.{:0width$}",
        whole,
        fraction,
        width = decimals as usize
    )
}

// Random opaque identifier, 32 lowercase hex chars
pub fn random_id() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}

// Random lock fencing token
pub fn random_token() -> String {
    let bytes: [u8; 24] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_bounds() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(450),
            jitter: Duration::from_millis(50),
        };
        for attempt in 1..=5u32 {
            let expected = Duration::from_millis((100u64 << (attempt - 1)).min(450));
            for _ in 0..20 {
                let delay = policy.delay_for_attempt(attempt);
                assert!(delay >= expected);
                assert!(delay < expected + Duration::from_millis(50));
            }
        }
    }

    #[tokio::test]
    async fn test_run_retries_then_succeeds() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = policy
            .run(
                "test",
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err("transient".to_string())
                        } else {
                            Ok(42)
                        }
                    }
                },
                |_| true,
            )
            .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_stops_on_fatal() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = policy
            .run(
                "test",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("fatal".to_string()) }
                },
                |e| e != "fatal",
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(5_000, 6), "0.005000");
        assert_eq!(format_units(1_234_567_890, 9), "1.234567890");
        assert_eq!(format_units(42, 0), "42");
    }
}
