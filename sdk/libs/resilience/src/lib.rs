/// Resilience patterns for the push SDK's outbound calls
///
/// This library provides:
/// - **Timeout**: Enforces time limits on provider calls
/// - **Retry**: Bounded retries with exponential backoff and jitter, limited to
///   errors the caller classifies as transient
/// - **Preset Configurations**: Pre-tuned settings for registration, background
///   fetches and endpoint removal
///
/// # Example: Provider call with a single retry
///
/// ```rust,no_run
/// use resilience::{presets, retry::with_retry_if, timeout::with_timeout};
///
/// #[tokio::main]
/// async fn main() {
///     let config = presets::endpoint_registration_config();
///     let limit = config.timeout.duration;
///
///     let result = with_retry_if(
///         config.retry,
///         move || async move {
///             with_timeout(limit, async {
///                 // Your provider call here
///                 Ok::<_, String>(())
///             })
///             .await
///             .map_err(|e| e.to_string())
///             .and_then(|r| r)
///         },
///         |_e| true,
///     )
///     .await;
/// }
/// ```

pub mod presets;
pub mod retry;
pub mod timeout;

// Re-export main types for convenience
pub use presets::{
    background_fetch_config, endpoint_registration_config, endpoint_removal_config, ServiceConfig,
};
pub use retry::{with_retry, with_retry_if, RetryConfig, RetryError};
pub use timeout::{with_timeout, with_timeout_result, TimeoutConfig, TimeoutError};
