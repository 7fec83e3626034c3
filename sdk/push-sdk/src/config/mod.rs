use resilience::{RetryConfig, ServiceConfig, TimeoutConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, SdkError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    pub push: PushConfig,
    pub registration: RegistrationConfig,
    pub background: BackgroundConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushConfig {
    /// Platform application used when `initialize` is not given one
    pub platform_application_arn: Option<String>,
    pub aws_region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Per provider call
    pub timeout_ms: u64,
    /// Clamped to 1
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// Budget inside which the background completion must fire
    pub deadline_ms: u64,
    /// Buffered notification sets per process-wide subscriber
    pub subscriber_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            push: PushConfig::default(),
            registration: RegistrationConfig {
                timeout_ms: 10_000,
                max_retries: 1,
                retry_backoff_ms: 200,
            },
            background: BackgroundConfig {
                deadline_ms: 25_000,
                subscriber_capacity: 64,
            },
            logging: LoggingConfig {
                filter: "info".to_string(),
                json: false,
            },
        }
    }
}

impl SdkConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = SdkConfig::default();

        Ok(SdkConfig {
            push: PushConfig {
                platform_application_arn: optional_var("PUSH_SDK_PLATFORM_APPLICATION_ARN"),
                aws_region: optional_var("PUSH_SDK_AWS_REGION"),
            },
            registration: RegistrationConfig {
                timeout_ms: parsed_var(
                    "PUSH_SDK_REGISTRATION_TIMEOUT_MS",
                    defaults.registration.timeout_ms,
                )?,
                max_retries: parsed_var(
                    "PUSH_SDK_REGISTRATION_MAX_RETRIES",
                    defaults.registration.max_retries,
                )?
                .min(1),
                retry_backoff_ms: parsed_var(
                    "PUSH_SDK_RETRY_BACKOFF_MS",
                    defaults.registration.retry_backoff_ms,
                )?,
            },
            background: BackgroundConfig {
                deadline_ms: parsed_var(
                    "PUSH_SDK_BACKGROUND_DEADLINE_MS",
                    defaults.background.deadline_ms,
                )?,
                subscriber_capacity: parsed_var(
                    "PUSH_SDK_SUBSCRIBER_CAPACITY",
                    defaults.background.subscriber_capacity,
                )?
                .max(1),
            },
            logging: LoggingConfig {
                filter: env::var("PUSH_SDK_LOG_FILTER").unwrap_or(defaults.logging.filter),
                json: parsed_var("PUSH_SDK_LOG_JSON", defaults.logging.json)?,
            },
        })
    }

    /// Timeout and bounded retry applied to registration calls
    pub fn registration_policy(&self) -> ServiceConfig {
        ServiceConfig {
            timeout: TimeoutConfig {
                duration: Duration::from_millis(self.registration.timeout_ms),
            },
            retry: RetryConfig {
                max_retries: self.registration.max_retries.min(1),
                initial_backoff: Duration::from_millis(self.registration.retry_backoff_ms),
                ..RetryConfig::default()
            },
        }
    }

    /// Timeout and bounded retry applied to background fetches
    ///
    /// Each attempt gets at most a third of the deadline so that two attempts
    /// and the backoff between them finish before the deadline.
    pub fn background_policy(&self) -> ServiceConfig {
        let mut policy = resilience::background_fetch_config();
        let per_attempt = self.background_deadline() / 3;
        if per_attempt < policy.timeout.duration {
            policy.timeout.duration = per_attempt;
        }
        policy
    }

    pub fn background_deadline(&self) -> Duration {
        Duration::from_millis(self.background.deadline_ms)
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| SdkError::Configuration(format!("{name} has invalid value {raw:?}"))),
        Err(_) => Ok(default),
    }
}
