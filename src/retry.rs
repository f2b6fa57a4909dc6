use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::sleep;
use tracing::warn;

/// Fixed-backoff retry for outbound calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub async fn run<T, F, Fut>(&self, operation_name: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if attempt >= max_attempts {
                        return Err(err).with_context(|| {
                            format!(
                                "operation {} failed after {} attempts",
                                operation_name, attempt
                            )
                        });
                    }

                    warn!(
                        operation = operation_name,
                        attempt,
                        delay_ms = self.backoff.as_millis() as u64,
                        error = %err,
                        "call failed, retrying"
                    );
                    sleep(self.backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn second_attempt_can_recover() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out = quick(2)
            .run("flaky", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("connection reset");
                }
                Ok(7)
            })
            .await
            .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = quick(2)
            .run("down", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow::anyhow!("503"))
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(err.to_string().contains("failed after 2 attempts"));
    }

    #[tokio::test]
    async fn zero_attempts_still_calls_once() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let _ = quick(0)
            .run("once", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow::anyhow!("nope"))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
