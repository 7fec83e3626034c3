use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Result, SdkError};

/// Identity of one initialize..free_all span
///
/// Work started under one generation checks `is_current` before writing its
/// result, so nothing lands in state that `free_all` already tore down.
#[derive(Debug, Clone)]
pub struct SessionGeneration {
    counter: Arc<AtomicU64>,
    value: u64,
}

impl SessionGeneration {
    /// Start a new generation on `counter`
    pub fn begin(counter: &Arc<AtomicU64>) -> Self {
        let value = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Self {
            counter: counter.clone(),
            value,
        }
    }

    /// Invalidate this generation and anything captured from it
    pub fn end(&self) {
        let _ = self.counter.compare_exchange(
            self.value,
            self.value + 1,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.value
    }

    pub fn value(&self) -> u64 {
        self.value
    }
}

/// Authentication and addressing context for network calls
///
/// Has no lock of its own; the facade owns it behind one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    access_token: Option<String>,
    channel_id: Option<String>,
    application_id: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the access token and application id. The token must not be empty.
    pub fn initialize(&mut self, token: &str, application_id: Option<&str>) -> Result<()> {
        if token.trim().is_empty() {
            return Err(SdkError::Configuration("access token is empty".to_string()));
        }
        self.access_token = Some(token.to_string());
        self.application_id = application_id
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string);
        Ok(())
    }

    pub fn set_channel_id(&mut self, id: &str) {
        self.channel_id = Some(id.to_string());
    }

    pub fn set_application_id(&mut self, id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(SdkError::Configuration("application id is empty".to_string()));
        }
        self.application_id = Some(id.to_string());
        Ok(())
    }

    /// Reset every field
    pub fn clear(&mut self) {
        *self = Session::default();
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    pub fn application_id(&self) -> Option<&str> {
        self.application_id.as_deref()
    }

    pub fn require_access_token(&self) -> Result<&str> {
        self.access_token()
            .ok_or_else(|| SdkError::Configuration("access token is not set".to_string()))
    }

    pub fn require_application_id(&self) -> Result<&str> {
        self.application_id().ok_or_else(|| {
            SdkError::Configuration("push application id is not set".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_ends() {
        let counter = Arc::new(AtomicU64::new(0));
        let first = SessionGeneration::begin(&counter);
        assert!(first.is_current());

        first.end();
        assert!(!first.is_current());

        let second = SessionGeneration::begin(&counter);
        assert!(second.is_current());
        assert!(!first.is_current());
        assert!(second.value() > first.value());
    }

    #[test]
    fn test_initialize_rejects_empty_token() {
        let mut session = Session::new();
        let result = session.initialize("  ", Some("app"));
        assert!(matches!(result, Err(SdkError::Configuration(_))));
        assert_eq!(session, Session::default());
    }

    #[test]
    fn test_initialize_sets_fields() {
        let mut session = Session::new();
        session.initialize("token", Some("arn:app")).unwrap();
        assert_eq!(session.require_access_token().unwrap(), "token");
        assert_eq!(session.require_application_id().unwrap(), "arn:app");
    }

    #[test]
    fn test_missing_application_id() {
        let mut session = Session::new();
        session.initialize("token", None).unwrap();
        assert!(matches!(
            session.require_application_id(),
            Err(SdkError::Configuration(_))
        ));
    }

    #[test]
    fn test_set_channel_id_is_idempotent() {
        let mut session = Session::new();
        session.set_channel_id("ch-1");
        session.set_channel_id("ch-1");
        assert_eq!(session.channel_id(), Some("ch-1"));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut session = Session::new();
        session.initialize("token", Some("arn:app")).unwrap();
        session.set_channel_id("ch-1");

        session.clear();

        assert_eq!(session, Session::default());
        assert!(session.require_access_token().is_err());
    }
}
