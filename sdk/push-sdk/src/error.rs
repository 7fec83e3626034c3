use resilience::{RetryError, TimeoutError};
use sns_endpoint_shared::EndpointError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SdkError>;

/// Errors surfaced by the SDK core
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SdkError {
    /// Missing token, application id or user; programmer error, never retried
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transient transport failure; retried at most once before surfacing
    #[error("network error: {0}")]
    Network(String),

    /// The provider refused the request
    #[error("registration rejected: {0}")]
    Registration(String),

    #[error("SDK not initialized: {0}")]
    NotInitialized(String),

    #[error("SDK already initialized")]
    AlreadyInitialized,

    /// Malformed payload
    #[error("parse error: {0}")]
    Parse(String),

    /// Failure reported by the persistence collaborator
    #[error("storage error: {0}")]
    Storage(String),
}

impl SdkError {
    /// Returns whether this error may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, SdkError::Network(_))
    }

    pub(crate) fn not_initialized() -> Self {
        SdkError::NotInitialized("call initialize first".to_string())
    }
}

impl From<EndpointError> for SdkError {
    fn from(err: EndpointError) -> Self {
        match err {
            EndpointError::Transport(_) | EndpointError::Throttled(_) => {
                SdkError::Network(err.to_string())
            }
            EndpointError::NotFound(_)
            | EndpointError::InvalidParameter(_)
            | EndpointError::Rejected(_)
            | EndpointError::Internal(_) => SdkError::Registration(err.to_string()),
        }
    }
}

impl From<TimeoutError> for SdkError {
    fn from(err: TimeoutError) -> Self {
        SdkError::Network(err.to_string())
    }
}

impl From<RetryError<SdkError>> for SdkError {
    fn from(err: RetryError<SdkError>) -> Self {
        err.into_inner()
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Parse(err.to_string())
    }
}
