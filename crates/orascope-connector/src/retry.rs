//! Retry policy for transient driver faults
//!
//! Connection resets and listener hiccups (ORA-3113, ORA-3114, ORA-12537,
//! ORA-12514) are retried with exponential backoff; everything else
//! propagates immediately.

use orascope_core::Result;
use std::future::Future;
use std::time::Duration;

/// Exponential backoff schedule for transient faults.
///
/// The default schedule is 50ms, 200ms, 800ms: three retries, quadrupling.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial_ms: u64,
    multiplier: u32,
    max_retries: u32,
}

impl Backoff {
    pub fn new(initial_ms: u64, multiplier: u32, max_retries: u32) -> Self {
        Self {
            initial_ms: initial_ms.max(1),
            multiplier: multiplier.max(1),
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt) as u64;
        Duration::from_millis(self.initial_ms.saturating_mul(factor))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(50, 4, 3)
    }
}

/// Run `op`, retrying transient failures per the backoff schedule.
pub async fn with_retries<T, F, Fut>(op_name: &str, backoff: &Backoff, op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < backoff.max_retries() => {
                let delay = backoff.delay(attempt);
                tracing::warn!(
                    op = %op_name,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orascope_core::OrascopeError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn schedule_matches_50_200_800() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(0), Duration::from_millis(50));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(800));
        assert_eq!(backoff.max_retries(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retries("test", &Backoff::default(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(OrascopeError::Query {
                        code: 3113,
                        message: "end-of-file on communication channel".into(),
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries("test", &Backoff::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(OrascopeError::Query {
                    code: 942,
                    message: "table or view does not exist".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries("test", &Backoff::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(OrascopeError::Connection("reset by peer".into()))
            }
        })
        .await;
        assert!(result.is_err());
        // Initial attempt plus three retries.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
