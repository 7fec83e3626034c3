/// Push SDK facade
///
/// Owns the session, the current user, the endpoint registrar and the
/// notification dispatcher for one `initialize..free_all` span, and exposes
/// the host-facing lifecycle operations.
///
/// State machine: `Uninitialized -> Initialized -> Uninitialized`. Every
/// operation other than `initialize` and `free_all` fails with
/// `SdkError::NotInitialized` outside the `Initialized` state.
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde_json::Value;
use sns_endpoint_shared::{DynEndpointProvider, SnsEndpointClient};
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::config::SdkConfig;
use crate::error::{Result, SdkError};
use crate::models::{BackgroundFetchResult, DeviceToken, NotificationSet, UserRecord};
use crate::services::{
    BackgroundFetcher, CompletionGuard, EndpointRegistrar, NotificationDelegate,
    NotificationDispatcher, StateStore,
};
use crate::session::{Session, SessionGeneration};

/// Process-wide instance; see `PushSdk::install`
static SHARED: OnceCell<PushSdk> = OnceCell::new();

pub struct PushSdk {
    config: SdkConfig,
    provider: DynEndpointProvider,
    store: Option<Arc<dyn StateStore>>,
    /// Outlives every session so observers survive `free_all`
    subscribers: broadcast::Sender<Arc<NotificationSet>>,
    generation: Arc<AtomicU64>,
    /// Serializes initialize / free_all
    lifecycle: Mutex<()>,
    context: RwLock<Option<Arc<SdkContext>>>,
}

/// Everything owned by one initialized span
struct SdkContext {
    session: Arc<RwLock<Session>>,
    user: Arc<Mutex<Option<UserRecord>>>,
    registrar: EndpointRegistrar,
    dispatcher: NotificationDispatcher,
    generation: SessionGeneration,
}

impl PushSdk {
    pub fn new(config: SdkConfig, provider: DynEndpointProvider) -> Self {
        let (subscribers, _) = broadcast::channel(config.background.subscriber_capacity.max(1));

        Self {
            config,
            provider,
            store: None,
            subscribers,
            generation: Arc::new(AtomicU64::new(0)),
            lifecycle: Mutex::new(()),
            context: RwLock::new(None),
        }
    }

    /// Persist the current user through `store`
    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build an SDK backed by Amazon SNS, credentials from the default chain
    pub async fn with_sns(config: SdkConfig) -> Self {
        let client = SnsEndpointClient::new(config.push.aws_region.clone()).await;
        Self::new(config, Arc::new(client))
    }

    /// Install `sdk` as the process-wide instance. Only the first call wins.
    pub fn install(sdk: PushSdk) -> Result<&'static PushSdk> {
        SHARED.set(sdk).map_err(|_| SdkError::AlreadyInitialized)?;
        Self::shared()
    }

    pub fn shared() -> Result<&'static PushSdk> {
        SHARED
            .get()
            .ok_or_else(|| SdkError::NotInitialized("no SDK instance installed".to_string()))
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.context.read().is_some()
    }

    fn context(&self) -> Result<Arc<SdkContext>> {
        self.context
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(SdkError::not_initialized)
    }

    /// Start a session.
    ///
    /// `application_id` falls back to the configured platform application.
    /// The user saved by the state store, if any, becomes the current user.
    /// Fails with `AlreadyInitialized` while a session is live, leaving it
    /// untouched.
    pub async fn initialize(
        &self,
        access_token: &str,
        application_id: Option<&str>,
        delegate: Option<Weak<dyn NotificationDelegate>>,
    ) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;

        if self.is_initialized() {
            warn!("initialize called on a live session");
            return Err(SdkError::AlreadyInitialized);
        }

        let mut session = Session::new();
        let application_id =
            application_id.or(self.config.push.platform_application_arn.as_deref());
        session.initialize(access_token, application_id)?;

        let user = match &self.store {
            Some(store) => store.load_user().await?,
            None => None,
        };

        let generation = SessionGeneration::begin(&self.generation);
        let session = Arc::new(RwLock::new(session));
        let user = Arc::new(Mutex::new(user));

        let registrar = EndpointRegistrar::new(
            self.provider.clone(),
            session.clone(),
            user.clone(),
            generation.clone(),
            self.config.registration_policy(),
        );
        let dispatcher = NotificationDispatcher::new(
            self.subscribers.clone(),
            self.config.background_deadline(),
            self.config.background_policy(),
        );
        dispatcher.set_delegate(delegate);

        info!(
            generation = generation.value(),
            has_application_id = application_id.is_some(),
            "Push SDK initialized"
        );

        *self.context.write() = Some(Arc::new(SdkContext {
            session,
            user,
            registrar,
            dispatcher,
            generation,
        }));

        Ok(())
    }

    /// Tear down the session. Calling it again is a no-op.
    ///
    /// Registrations still in flight notice the ended generation and discard
    /// their results.
    pub async fn free_all(&self) {
        let _lifecycle = self.lifecycle.lock().await;

        let context = self.context.write().take();
        let Some(context) = context else {
            debug!("free_all on an uninitialized SDK");
            return;
        };

        context.generation.end();
        context.session.write().clear();
        context.dispatcher.set_delegate(None);
        context.user.lock().await.take();

        info!(generation = context.generation.value(), "Push SDK freed");
    }

    /// Hand the current user to the state store
    pub async fn save_all(&self) -> Result<()> {
        let context = self.context()?;

        let Some(store) = &self.store else {
            debug!("No state store configured, nothing to save");
            return Ok(());
        };

        let user = context.user.lock().await.clone();
        match user {
            Some(user) => {
                store.save_user(&user).await?;
                debug!(user_id = %user.user_id, "Saved current user");
            }
            None => debug!("No current user to save"),
        }
        Ok(())
    }

    pub fn set_channel_id(&self, channel_id: &str) -> Result<()> {
        self.context()?.session.write().set_channel_id(channel_id);
        Ok(())
    }

    /// Set the platform application endpoints are registered against
    pub fn setup_push_notifications(&self, application_id: &str) -> Result<()> {
        self.context()?
            .session
            .write()
            .set_application_id(application_id)?;
        info!(application_id = %application_id, "Push notifications configured");
        Ok(())
    }

    /// Snapshot of the current session
    pub fn session(&self) -> Result<Session> {
        Ok(self.context()?.session.read().clone())
    }

    pub fn set_delegate(&self, delegate: Option<Weak<dyn NotificationDelegate>>) -> Result<()> {
        self.context()?.dispatcher.set_delegate(delegate);
        Ok(())
    }

    /// Observe every notification set broadcast from now on
    pub fn subscribe(&self) -> Result<broadcast::Receiver<Arc<NotificationSet>>> {
        self.context()?;
        Ok(self.subscribers.subscribe())
    }

    pub fn add_background_fetcher(&self, fetcher: Arc<dyn BackgroundFetcher>) -> Result<()> {
        self.context()?.dispatcher.add_background_fetcher(fetcher);
        Ok(())
    }

    /// Make `user` the current user.
    ///
    /// When `user` is the current user again, the endpoint ARN already on
    /// record is kept.
    pub async fn set_current_user(&self, mut user: UserRecord) -> Result<()> {
        let context = self.context()?;
        let mut current = context.user.lock().await;

        if let Some(existing) = current.as_ref().filter(|c| c.user_id == user.user_id) {
            user.set_platform_endpoint_arn(existing.platform_endpoint_arn().map(str::to_string));
        }

        debug!(user_id = %user.user_id, "Current user set");
        *current = Some(user);
        Ok(())
    }

    /// Apply a server user payload.
    ///
    /// Merges into the current user when the ids match (or the payload has no
    /// id), otherwise the payload replaces the current user.
    pub async fn update_current_user(&self, payload: &Value) -> Result<UserRecord> {
        let context = self.context()?;
        let payload = payload
            .as_object()
            .ok_or_else(|| SdkError::Parse("user payload must be an object".to_string()))?;

        let payload_id = payload
            .get("id")
            .or_else(|| payload.get("user_id"))
            .and_then(|id| match id {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        let mut current = context.user.lock().await;
        let updated = match current.as_mut() {
            Some(user) if payload_id.as_deref().map_or(true, |id| id == user.user_id) => {
                user.apply_payload(payload)?;
                user.clone()
            }
            _ => {
                let user = UserRecord::from_payload(payload)?;
                *current = Some(user.clone());
                user
            }
        };

        debug!(user_id = %updated.user_id, "Current user updated");
        Ok(updated)
    }

    pub async fn current_user(&self) -> Result<Option<UserRecord>> {
        let context = self.context()?;
        let user = context.user.lock().await.clone();
        Ok(user)
    }

    /// Register the device token and return the endpoint ARN
    pub async fn register_device_token(&self, token: &DeviceToken) -> Result<String> {
        let context = self.context()?;
        let endpoint = context.registrar.register_device_token(token).await?;
        Ok(endpoint.arn)
    }

    /// Remove this device's endpoint on logout. Provider failures are logged.
    pub async fn deregister_device(&self) -> Result<()> {
        self.context()?.registrar.deregister().await;
        Ok(())
    }

    /// Foreground notification
    pub fn handle_notification(&self, payload: &Value) -> Result<Arc<NotificationSet>> {
        self.context()?.dispatcher.handle_foreground(payload)
    }

    /// Background notification. `completion` fires exactly once, including
    /// when the SDK is not initialized.
    pub async fn handle_background_notification<F>(
        &self,
        payload: &Value,
        completion: F,
    ) -> Result<BackgroundFetchResult>
    where
        F: FnOnce(BackgroundFetchResult) + Send,
    {
        let context = match self.context() {
            Ok(context) => context,
            Err(e) => {
                warn!("Background notification received while not initialized");
                completion(BackgroundFetchResult::Failed);
                return Err(e);
            }
        };

        Ok(context.dispatcher.handle_background(payload, completion).await)
    }

    /// Acknowledge the events of a background network session.
    ///
    /// No transfers run through background sessions, so there is nothing to
    /// reattach; `completion` fires once on every path.
    pub fn handle_background_session<F>(&self, identifier: &str, completion: F) -> Result<()>
    where
        F: FnOnce(),
    {
        let guard = CompletionGuard::new(|()| completion(), ());
        self.context()?;
        debug!(identifier = %identifier, "Background session events acknowledged");
        guard.complete(());
        Ok(())
    }

    pub fn broadcast_notifications(&self, notifications: NotificationSet) -> Result<Arc<NotificationSet>> {
        Ok(self.context()?.dispatcher.broadcast(notifications))
    }
}
