use thiserror::Error;

/// Platform endpoint error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Platform endpoint not found: {0}")]
    NotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Request rejected by provider: {0}")]
    Rejected(String),

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EndpointError {
    /// Check if error is transient (should retry)
    pub fn is_transient(&self) -> bool {
        matches!(self, EndpointError::Transport(_) | EndpointError::Throttled(_))
    }

    /// Map an SNS error code and message onto an endpoint error
    pub fn from_code(code: Option<&str>, message: Option<&str>) -> Self {
        let message = message.unwrap_or("no message").to_string();
        match code {
            Some("NotFound") | Some("NotFoundException") => EndpointError::NotFound(message),
            Some("InvalidParameter") | Some("InvalidParameterValue") => {
                EndpointError::InvalidParameter(message)
            }
            Some("AuthorizationError")
            | Some("PlatformApplicationDisabled")
            | Some("EndpointDisabled")
            | Some("InvalidClientTokenId") => EndpointError::Rejected(message),
            Some("Throttled") | Some("Throttling") | Some("ThrottlingException") => {
                EndpointError::Throttled(message)
            }
            Some("InternalError") | Some("ServiceUnavailable") => EndpointError::Transport(message),
            Some(other) => EndpointError::Internal(format!("{other}: {message}")),
            None => EndpointError::Internal(message),
        }
    }
}
