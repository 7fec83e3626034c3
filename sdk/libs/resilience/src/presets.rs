/// Preset configurations for the SDK's outbound calls
use crate::retry::RetryConfig;
use crate::timeout::TimeoutConfig;
use std::time::Duration;

/// Configuration bundle for a call type
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub timeout: TimeoutConfig,
    pub retry: RetryConfig,
}

impl ServiceConfig {
    /// Longest a single guarded call can take, retries and backoff included
    pub fn worst_case(&self) -> Duration {
        self.timeout.duration * (self.retry.max_retries + 1) + self.retry.worst_case_backoff()
    }
}

/// Push endpoint registration (create/update/lookup against the provider)
///
/// - Timeout: 10s per call
/// - Retry: one retry on transient failure
pub fn endpoint_registration_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(10),
        },
        retry: RetryConfig {
            max_retries: 1,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            jitter: true,
        },
    }
}

/// Lookups triggered while handling a background notification
///
/// - Timeout: 8s per call so two attempts fit well inside the host budget
/// - Retry: one retry, short backoff
pub fn background_fetch_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(8),
        },
        retry: RetryConfig {
            max_retries: 1,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            jitter: false,
        },
    }
}

/// Endpoint removal on logout
///
/// - Timeout: 5s
/// - No retry (best-effort, the session is ending anyway)
pub fn endpoint_removal_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(5),
        },
        retry: RetryConfig::none(),
    }
}
