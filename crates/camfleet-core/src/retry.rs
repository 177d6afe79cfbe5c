// ── Bounded retry ──
//
// Short exponential backoff around single device calls. Only transient
// failures (link unavailable, timeout) are retried; anything the camera
// actually answered is returned at once.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::error::CoreError;
use crate::model::Serial;

/// Backoff for connect, control and media-listing calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total tries per call, including the first. Zero behaves as one.
    pub attempts: u32,

    /// Delay before the first retry. Default: 500ms.
    pub initial_delay: Duration,

    /// Upper bound on the delay between tries. Default: 5s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// `min(initial * 2^retry, max)`
    fn backoff(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2_u32.saturating_pow(retry))
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails for good, or the tries run out.
    pub async fn run<T, F, Fut>(&self, serial: &Serial, mut op: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let attempts = self.attempts.max(1);
        let mut tried = 1;
        loop {
            match op().await {
                Err(e) if tried < attempts && e.is_retryable() => {
                    let delay = self.backoff(tried - 1);
                    debug!(
                        %serial,
                        attempt = tried,
                        error = %e,
                        ?delay,
                        "transient failure, retrying"
                    );
                    sleep(delay).await;
                    tried += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast(attempts: u32) -> RetryConfig {
        RetryConfig {
            attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn unavailable() -> CoreError {
        CoreError::TransportUnavailable {
            serial: "0001".into(),
            transport: "short-range".into(),
            reason: "out of range".into(),
        }
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff(0), Duration::from_millis(500));
        assert_eq!(config.backoff(1), Duration::from_secs(1));
        assert_eq!(config.backoff(3), Duration::from_secs(4));
        assert_eq!(config.backoff(10), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn transient_failure_is_retried_until_success() {
        let calls = &AtomicU32::new(0);
        let out = fast(3)
            .run(&Serial::from("0001"), move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(unavailable())
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn tries_are_bounded() {
        let calls = &AtomicU32::new(0);
        let err = fast(3)
            .run(&Serial::from("0001"), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(CoreError::Timeout { timeout_secs: 1 })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Timeout { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn device_rejections_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let err = fast(5)
            .run(&Serial::from("0001"), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(CoreError::Api {
                    message: "busy".into(),
                    status: Some(409),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Api { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
