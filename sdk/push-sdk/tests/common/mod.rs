#![allow(dead_code)]
/// Shared fixtures for push-sdk integration tests
///
/// Every test drives the facade against the in-memory provider, so no
/// network or credentials are needed.
use async_trait::async_trait;
use push_sdk::{
    BackgroundFetchResult, NotificationDelegate, NotificationSet, PushSdk, Result, SdkConfig,
    SdkError, StateStore, UserRecord,
};
use sns_endpoint_shared::InMemoryEndpointProvider;
use std::sync::{Arc, Mutex, Weak};

// ============================================
// SDK Setup
// ============================================

pub const ACCESS_TOKEN: &str = "access-token";
pub const APPLICATION_ARN: &str = "arn:aws:sns:us-east-1:123456789012:app/APNS/chat";

/// Config with short timeouts so failure paths finish quickly
pub fn fast_config() -> SdkConfig {
    let mut config = SdkConfig::default();
    config.registration.timeout_ms = 200;
    config.registration.retry_backoff_ms = 10;
    config.background.deadline_ms = 2_000;
    config
}

pub fn test_sdk() -> (PushSdk, Arc<InMemoryEndpointProvider>) {
    let provider = Arc::new(InMemoryEndpointProvider::new());
    let sdk = PushSdk::new(fast_config(), provider.clone());
    (sdk, provider)
}

/// Initialized SDK with `u-1` as the current user
pub async fn signed_in_sdk() -> (PushSdk, Arc<InMemoryEndpointProvider>) {
    let (sdk, provider) = test_sdk();
    sdk.initialize(ACCESS_TOKEN, Some(APPLICATION_ARN), None)
        .await
        .expect("initialize");
    sdk.set_current_user(UserRecord::new("u-1", "sam"))
        .await
        .expect("set user");
    (sdk, provider)
}

// ============================================
// Collaborators
// ============================================

/// State store keeping the last saved user in memory
#[derive(Default)]
pub struct MemoryStateStore {
    pub saved: Mutex<Option<UserRecord>>,
    pub fail_saves: Mutex<bool>,
}

impl MemoryStateStore {
    pub fn with_user(user: UserRecord) -> Self {
        Self {
            saved: Mutex::new(Some(user)),
            fail_saves: Mutex::new(false),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load_user(&self) -> Result<Option<UserRecord>> {
        Ok(self.saved.lock().unwrap().clone())
    }

    async fn save_user(&self, user: &UserRecord) -> Result<()> {
        if *self.fail_saves.lock().unwrap() {
            return Err(SdkError::Storage("disk full".to_string()));
        }
        *self.saved.lock().unwrap() = Some(user.clone());
        Ok(())
    }
}

/// Delegate recording the size of every set it receives
#[derive(Default)]
pub struct RecordingDelegate {
    pub received: Mutex<Vec<NotificationSet>>,
}

impl NotificationDelegate for RecordingDelegate {
    fn notifications_received(&self, notifications: &NotificationSet) {
        self.received.lock().unwrap().push(notifications.clone());
    }
}

pub fn weak_delegate(delegate: &Arc<RecordingDelegate>) -> Weak<dyn NotificationDelegate> {
    let weak: Weak<dyn NotificationDelegate> = Arc::downgrade(delegate) as _;
    weak
}

/// Completion callback plus the outcomes it was fired with
pub fn recording_completion() -> (
    Arc<Mutex<Vec<BackgroundFetchResult>>>,
    impl FnOnce(BackgroundFetchResult) + Send,
) {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let fired_clone = fired.clone();
    (fired, move |outcome| fired_clone.lock().unwrap().push(outcome))
}
