/// Integration tests for resilience library
use resilience::{
    presets,
    retry::{with_retry_if, RetryConfig, RetryError},
    timeout::{with_timeout_result, TimeoutError},
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, PartialEq)]
enum ProviderError {
    Transient,
    Rejected,
    TimedOut,
}

impl From<TimeoutError> for ProviderError {
    fn from(_: TimeoutError) -> Self {
        ProviderError::TimedOut
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

fn retryable(e: &ProviderError) -> bool {
    matches!(e, ProviderError::Transient | ProviderError::TimedOut)
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 1,
        initial_backoff: Duration::from_millis(5),
        jitter: false,
        ..Default::default()
    }
}

// ==================== Retry + Timeout Combined ====================

#[tokio::test]
async fn test_timed_out_attempt_is_retried_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let result = with_retry_if(
        fast_retry(),
        move || {
            let n = calls_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                with_timeout_result(Duration::from_millis(20), async move {
                    if n == 0 {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                    Ok::<_, ProviderError>("arn:1")
                })
                .await
            }
        },
        retryable,
    )
    .await;

    assert_eq!(result.unwrap(), "arn:1");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rejection_surfaces_without_retry() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let result = with_retry_if(
        fast_retry(),
        move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ProviderError::Rejected) }
        },
        retryable,
    )
    .await;

    assert!(matches!(result, Err(RetryError::Permanent(ProviderError::Rejected))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_persistent_transient_failure_is_bounded_in_time() {
    let start = Instant::now();

    let result = with_retry_if(
        fast_retry(),
        || async {
            with_timeout_result(Duration::from_millis(20), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<(), ProviderError>(())
            })
            .await
        },
        retryable,
    )
    .await;

    let err = result.unwrap_err();
    assert!(matches!(err, RetryError::Exhausted { attempts: 2, .. }));
    assert_eq!(err.into_inner(), ProviderError::TimedOut);
    assert!(start.elapsed() < Duration::from_secs(1));
}

// ==================== Presets ====================

#[test]
fn test_registration_preset() {
    let config = presets::endpoint_registration_config();
    assert_eq!(config.retry.max_retries, 1);
    assert_eq!(config.timeout.duration, Duration::from_secs(10));
}

#[test]
fn test_removal_preset_does_not_retry() {
    let config = presets::endpoint_removal_config();
    assert_eq!(config.retry.max_retries, 0);
}
