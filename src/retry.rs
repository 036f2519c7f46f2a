//! Bounded retry with exponential backoff
//!
//! Used around the photo-library endpoints only; email transports are
//! deliberately not retried (a failed send is logged and dropped).

use std::future::Future;
use std::time::Duration;

/// Retry policy: a fixed attempt budget with a doubling, clamped delay
/// between attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub attempts: u32,
    pub base: Duration,
    pub floor: Duration,
    pub ceiling: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            attempts: 3,
            base: Duration::from_secs(1),
            floor: Duration::from_secs(4),
            ceiling: Duration::from_secs(10),
        }
    }
}

impl Backoff {
    /// Delay after `failures` failed attempts: `base * 2^failures`,
    /// clamped to `[floor, ceiling]`.
    pub fn delay(&self, failures: u32) -> Duration {
        let exp = self.base.saturating_mul(1u32 << failures.min(30));
        exp.clamp(self.floor, self.ceiling)
    }

    /// Run `op` until it succeeds or the attempt budget is exhausted,
    /// sleeping between attempts. The last error is returned as-is.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut failures = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    failures += 1;
                    if failures >= self.attempts {
                        log::error!("{} failed after {} attempts: {}", what, failures, err);
                        return Err(err);
                    }
                    let delay = self.delay(failures);
                    log::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what,
                        failures,
                        self.attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn tiny() -> Backoff {
        Backoff {
            attempts: 3,
            base: Duration::from_millis(1),
            floor: Duration::from_millis(1),
            ceiling: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_delay_clamps_to_floor_and_ceiling() {
        let policy = Backoff::default();
        let delays: Vec<u64> = (1..=5).map(|n| policy.delay(n).as_secs()).collect();
        assert_eq!(delays, vec![4, 4, 8, 10, 10]);
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let result: Result<u32, String> = tiny()
            .run("op", move || {
                let calls = seen.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(format!("boom {}", n))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_return_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let result: Result<u32, String> = tiny()
            .run("op", move || {
                let calls = seen.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(format!("boom {}", n))
                }
            })
            .await;
        assert_eq!(result, Err("boom 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
