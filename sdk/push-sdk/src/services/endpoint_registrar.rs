/// Platform Endpoint Registrar
///
/// Keeps the current user's platform endpoint pointed at the device's latest
/// push token:
/// - Creates an endpoint when the user has none, then checks it: SNS answers
///   a create for a token it already knows with the existing endpoint, which
///   may be disabled or still name a previous user
/// - Updates the stored endpoint in place when the token changes or the
///   provider disabled it, so returning users never accumulate endpoints
/// - Recreates the endpoint when the provider no longer knows the stored ARN,
///   retiring the old ARN once the new one is confirmed
/// - Removes the endpoint on logout (best-effort)
///
/// Registrations are serialized per registrar, which makes it the single
/// writer of `UserRecord::platform_endpoint_arn`.
use parking_lot::RwLock;
use resilience::{with_retry_if, with_timeout, RetryError, ServiceConfig};
use sns_endpoint_shared::{token_prefix, DynEndpointProvider, EndpointError};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, SdkError};
use crate::models::{DeviceToken, PlatformEndpoint, UserRecord};
use crate::session::{Session, SessionGeneration};

/// How the endpoint was brought up to date
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reconciled {
    Created,
    Updated,
    Unchanged,
}

#[derive(Clone)]
pub struct EndpointRegistrar {
    inner: Arc<RegistrarInner>,
}

struct RegistrarInner {
    provider: DynEndpointProvider,
    session: Arc<RwLock<Session>>,
    user: Arc<Mutex<Option<UserRecord>>>,
    generation: SessionGeneration,
    registration_lock: Mutex<()>,
    policy: ServiceConfig,
    removal_policy: ServiceConfig,
}

impl EndpointRegistrar {
    pub fn new(
        provider: DynEndpointProvider,
        session: Arc<RwLock<Session>>,
        user: Arc<Mutex<Option<UserRecord>>>,
        generation: SessionGeneration,
        policy: ServiceConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RegistrarInner {
                provider,
                session,
                user,
                generation,
                registration_lock: Mutex::new(()),
                policy,
                removal_policy: resilience::endpoint_removal_config(),
            }),
        }
    }

    /// Register `token` for the current user and return the confirmed endpoint.
    ///
    /// The provider calls run on a spawned worker; only this caller waits.
    pub async fn register_device_token(&self, token: &DeviceToken) -> Result<PlatformEndpoint> {
        if token.is_empty() {
            return Err(SdkError::Configuration("device token is empty".to_string()));
        }

        let inner = self.inner.clone();
        let token = token.to_hex();

        tokio::spawn(async move { inner.register(token).await })
            .await
            .map_err(|e| SdkError::Registration(format!("registration worker failed: {e}")))?
    }

    /// Remove the current endpoint. Failures are logged, never returned.
    ///
    /// The ARN is cleared from the user record whether or not the provider
    /// call succeeds.
    pub async fn deregister(&self) {
        self.inner.deregister().await
    }
}

impl RegistrarInner {
    async fn register(&self, token: String) -> Result<PlatformEndpoint> {
        let _serial = self.registration_lock.lock().await;

        if !self.generation.is_current() {
            return Err(SdkError::NotInitialized(
                "session ended before registration started".to_string(),
            ));
        }

        let application_id = {
            let session = self.session.read();
            session.require_access_token()?;
            session.require_application_id()?.to_string()
        };

        let (user_id, stored_arn) = {
            let user = self.user.lock().await;
            let user = user.as_ref().ok_or_else(|| {
                SdkError::Configuration("no current user to register the device for".to_string())
            })?;
            (
                user.user_id.clone(),
                user.platform_endpoint_arn().map(str::to_string),
            )
        };

        debug!(
            user_id = %user_id,
            token = %token_prefix(&token),
            stored_arn = ?stored_arn,
            "Registering device token"
        );

        let (arn, reconciled) = match stored_arn.as_deref() {
            None => (
                self.create(&application_id, &token, &user_id).await?,
                Reconciled::Created,
            ),
            Some(arn) => self.reconcile(arn, &application_id, &token, &user_id).await?,
        };

        self.commit(&user_id, &arn, &reconciled).await?;

        if reconciled == Reconciled::Created {
            if let Some(old) = stored_arn.filter(|old| *old != arn) {
                self.retire(&old).await;
            }
        }

        info!(
            user_id = %user_id,
            arn = %arn,
            outcome = ?reconciled,
            "Device token registered"
        );

        Ok(PlatformEndpoint { arn, user_id })
    }

    /// Bring an existing endpoint in line with `token`
    async fn reconcile(
        &self,
        arn: &str,
        application_id: &str,
        token: &str,
        user_id: &str,
    ) -> Result<(String, Reconciled)> {
        let provider = &self.provider;

        let attributes = match self
            .call(&self.policy, move || provider.get_endpoint_attributes(arn))
            .await
        {
            Ok(attributes) => attributes,
            Err(EndpointError::NotFound(_)) => {
                warn!(arn = %arn, "Stored endpoint no longer exists, creating a new one");
                let created = self.create(application_id, token, user_id).await?;
                return Ok((created, Reconciled::Created));
            }
            Err(e) => return Err(e.into()),
        };

        if !attributes.needs_update(token, Some(user_id)) {
            debug!(arn = %arn, "Endpoint already up to date");
            return Ok((arn.to_string(), Reconciled::Unchanged));
        }

        match self
            .call(&self.policy, move || {
                provider.update_platform_endpoint(arn, token, Some(user_id))
            })
            .await
        {
            Ok(()) => Ok((arn.to_string(), Reconciled::Updated)),
            Err(EndpointError::NotFound(_)) => {
                warn!(arn = %arn, "Endpoint vanished during update, creating a new one");
                let created = self.create(application_id, token, user_id).await?;
                Ok((created, Reconciled::Created))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create an endpoint and make sure it delivers `token` to `user_id`
    async fn create(&self, application_id: &str, token: &str, user_id: &str) -> Result<String> {
        let provider = &self.provider;
        let arn = self
            .call(&self.policy, move || {
                provider.create_platform_endpoint(application_id, token, Some(user_id))
            })
            .await?;

        let created = arn.as_str();
        let attributes = self
            .call(&self.policy, move || provider.get_endpoint_attributes(created))
            .await?;

        if attributes.needs_update(token, Some(user_id)) {
            info!(
                arn = %arn,
                enabled = attributes.enabled,
                previous_user = ?attributes.custom_user_data,
                "Provider returned an existing endpoint, updating it in place"
            );
            self.call(&self.policy, move || {
                provider.update_platform_endpoint(created, token, Some(user_id))
            })
            .await?;
        }

        Ok(arn)
    }

    /// Store the ARN on the user record unless the session or user moved on
    async fn commit(&self, user_id: &str, arn: &str, reconciled: &Reconciled) -> Result<()> {
        let stale = {
            let mut user = self.user.lock().await;
            if !self.generation.is_current() {
                Some(SdkError::NotInitialized(
                    "session ended during registration".to_string(),
                ))
            } else {
                match user.as_mut() {
                    Some(user) if user.user_id == user_id => {
                        user.set_platform_endpoint_arn(Some(arn.to_string()));
                        None
                    }
                    _ => Some(SdkError::Configuration(
                        "current user changed during registration".to_string(),
                    )),
                }
            }
        };

        match stale {
            None => Ok(()),
            Some(err) => {
                warn!(arn = %arn, error = %err, "Discarding registration result");
                if *reconciled == Reconciled::Created {
                    // Nobody will ever reference the endpoint we just made
                    self.retire(arn).await;
                }
                Err(err)
            }
        }
    }

    async fn retire(&self, arn: &str) {
        let provider = &self.provider;
        match self
            .call(&self.removal_policy, move || provider.delete_platform_endpoint(arn))
            .await
        {
            Ok(()) => info!(arn = %arn, "Retired platform endpoint"),
            Err(e) => warn!(arn = %arn, error = %e, "Failed to retire platform endpoint"),
        }
    }

    async fn deregister(&self) {
        let _serial = self.registration_lock.lock().await;

        let arn = {
            let mut user = self.user.lock().await;
            user.as_mut().and_then(|user| {
                let arn = user.platform_endpoint_arn().map(str::to_string);
                user.set_platform_endpoint_arn(None);
                arn
            })
        };

        match arn {
            Some(arn) => self.retire(&arn).await,
            None => debug!("No platform endpoint to deregister"),
        }
    }

    /// One provider call under the timeout and bounded retry policy
    async fn call<T, F, Fut>(&self, policy: &ServiceConfig, mut op: F) -> std::result::Result<T, EndpointError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, EndpointError>>,
    {
        let limit = policy.timeout.duration;

        with_retry_if(
            policy.retry.clone(),
            || {
                let attempt = op();
                async move {
                    match with_timeout(limit, attempt).await {
                        Ok(result) => result,
                        Err(elapsed) => Err(EndpointError::Transport(elapsed.to_string())),
                    }
                }
            },
            EndpointError::is_transient,
        )
        .await
        .map_err(RetryError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilience::{RetryConfig, TimeoutConfig};
    use sns_endpoint_shared::InMemoryEndpointProvider;
    use std::sync::atomic::AtomicU64;
    use std::time::Duration;

    struct Fixture {
        provider: Arc<InMemoryEndpointProvider>,
        user: Arc<Mutex<Option<UserRecord>>>,
        generation: SessionGeneration,
        registrar: EndpointRegistrar,
    }

    fn fast_policy() -> ServiceConfig {
        ServiceConfig {
            timeout: TimeoutConfig {
                duration: Duration::from_millis(200),
            },
            retry: RetryConfig {
                max_retries: 1,
                initial_backoff: Duration::from_millis(5),
                jitter: false,
                ..Default::default()
            },
        }
    }

    fn fixture() -> Fixture {
        let provider = Arc::new(InMemoryEndpointProvider::new());
        let mut session = Session::new();
        session.initialize("access", Some("arn:app")).unwrap();
        let session = Arc::new(RwLock::new(session));
        let user = Arc::new(Mutex::new(Some(UserRecord::new("u-1", "sam"))));
        let generation = SessionGeneration::begin(&Arc::new(AtomicU64::new(0)));

        let registrar = EndpointRegistrar::new(
            provider.clone(),
            session,
            user.clone(),
            generation.clone(),
            fast_policy(),
        );

        Fixture {
            provider,
            user,
            generation,
            registrar,
        }
    }

    fn token(bytes: &[u8]) -> DeviceToken {
        DeviceToken::new(bytes.to_vec())
    }

    #[tokio::test]
    async fn test_first_registration_creates_endpoint() {
        let f = fixture();

        let endpoint = f.registrar.register_device_token(&token(&[1, 2])).await.unwrap();

        assert_eq!(endpoint.user_id, "u-1");
        assert_eq!(f.provider.endpoint_count(), 1);
        let attrs = f.provider.endpoint(&endpoint.arn).unwrap();
        assert_eq!(attrs.token, "0102");
        assert_eq!(attrs.custom_user_data.as_deref(), Some("u-1"));

        let user = f.user.lock().await;
        assert_eq!(user.as_ref().unwrap().platform_endpoint_arn(), Some(endpoint.arn.as_str()));
    }

    #[tokio::test]
    async fn test_same_token_is_idempotent() {
        let f = fixture();

        let first = f.registrar.register_device_token(&token(&[1])).await.unwrap();
        let second = f.registrar.register_device_token(&token(&[1])).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.provider.endpoint_count(), 1);
        assert_eq!(f.provider.calls().create, 1);
        assert_eq!(f.provider.calls().update, 0);
    }

    #[tokio::test]
    async fn test_rotated_token_updates_in_place() {
        let f = fixture();

        let first = f.registrar.register_device_token(&token(&[1])).await.unwrap();
        let second = f.registrar.register_device_token(&token(&[2])).await.unwrap();

        assert_eq!(first.arn, second.arn);
        assert_eq!(f.provider.endpoint_count(), 1);
        assert_eq!(f.provider.endpoint(&first.arn).unwrap().token, "02");
    }

    #[tokio::test]
    async fn test_disabled_endpoint_is_reenabled() {
        let f = fixture();

        let first = f.registrar.register_device_token(&token(&[1])).await.unwrap();
        f.provider.disable_endpoint(&first.arn);
        let second = f.registrar.register_device_token(&token(&[1])).await.unwrap();

        assert_eq!(first.arn, second.arn);
        assert!(f.provider.endpoint(&first.arn).unwrap().enabled);
        assert_eq!(f.provider.calls().update, 1);
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_recreated_and_old_arn_retired() {
        let f = fixture();

        let first = f.registrar.register_device_token(&token(&[1])).await.unwrap();
        f.provider.remove_endpoint(&first.arn);
        let second = f.registrar.register_device_token(&token(&[1])).await.unwrap();

        assert_ne!(first.arn, second.arn);
        assert_eq!(f.provider.endpoint_count(), 1);
        assert_eq!(f.provider.calls().delete, 1);
    }

    #[tokio::test]
    async fn test_recovered_endpoint_is_taken_over() {
        let f = fixture();
        f.provider.recover_existing_on_create(true);

        let first = f.registrar.register_device_token(&token(&[1])).await.unwrap();
        f.provider.disable_endpoint(&first.arn);
        *f.user.lock().await = Some(UserRecord::new("u-2", "alex"));

        let second = f.registrar.register_device_token(&token(&[1])).await.unwrap();

        assert_eq!(second.arn, first.arn);
        assert_eq!(second.user_id, "u-2");
        let attrs = f.provider.endpoint(&first.arn).unwrap();
        assert!(attrs.enabled);
        assert_eq!(attrs.custom_user_data.as_deref(), Some("u-2"));
        assert_eq!(f.provider.calls().update, 1);
        assert_eq!(f.provider.endpoint_count(), 1);
    }

    #[tokio::test]
    async fn test_stored_endpoint_of_other_user_is_rewritten() {
        let f = fixture();
        let first = f.registrar.register_device_token(&token(&[1])).await.unwrap();

        let mut other = UserRecord::new("u-2", "alex");
        other.set_platform_endpoint_arn(Some(first.arn.clone()));
        *f.user.lock().await = Some(other);

        let second = f.registrar.register_device_token(&token(&[1])).await.unwrap();

        assert_eq!(second.arn, first.arn);
        let attrs = f.provider.endpoint(&first.arn).unwrap();
        assert_eq!(attrs.custom_user_data.as_deref(), Some("u-2"));
        assert_eq!(f.provider.calls().update, 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let f = fixture();
        f.provider.fail_next_transient(1);

        let endpoint = f.registrar.register_device_token(&token(&[1])).await.unwrap();

        assert_eq!(f.provider.calls().create, 2);
        assert_eq!(f.provider.endpoint_count(), 1);
        assert!(endpoint.arn.starts_with("arn:local:endpoint:"));
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_network_error() {
        let f = fixture();
        f.provider.fail_next_transient(2);

        let result = f.registrar.register_device_token(&token(&[1])).await;

        assert!(matches!(result, Err(SdkError::Network(_))));
        assert_eq!(f.provider.calls().create, 2);
        let user = f.user.lock().await;
        assert_eq!(user.as_ref().unwrap().platform_endpoint_arn(), None);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let f = fixture();
        f.provider.reject_application("arn:app");

        let result = f.registrar.register_device_token(&token(&[1])).await;

        assert!(matches!(result, Err(SdkError::Registration(_))));
        assert_eq!(f.provider.calls().create, 1);
    }

    #[tokio::test]
    async fn test_empty_token_is_configuration_error() {
        let f = fixture();
        let result = f.registrar.register_device_token(&token(&[])).await;
        assert!(matches!(result, Err(SdkError::Configuration(_))));
        assert_eq!(f.provider.calls(), Default::default());
    }

    #[tokio::test]
    async fn test_no_user_is_configuration_error() {
        let f = fixture();
        *f.user.lock().await = None;

        let result = f.registrar.register_device_token(&token(&[1])).await;
        assert!(matches!(result, Err(SdkError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_result_discarded_after_generation_ends() {
        let f = fixture();
        f.provider.set_latency(Duration::from_millis(50));

        let registrar = f.registrar.clone();
        let pending = tokio::spawn(async move { registrar.register_device_token(&token(&[1])).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        f.generation.end();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(SdkError::NotInitialized(_))));

        let user = f.user.lock().await;
        assert_eq!(user.as_ref().unwrap().platform_endpoint_arn(), None);
        // The orphaned endpoint was cleaned up
        assert_eq!(f.provider.endpoint_count(), 0);
    }

    #[tokio::test]
    async fn test_deregister_clears_arn_even_on_failure() {
        let f = fixture();
        f.registrar.register_device_token(&token(&[1])).await.unwrap();
        f.provider.fail_next_transient(1);

        f.registrar.deregister().await;

        let user = f.user.lock().await;
        assert_eq!(user.as_ref().unwrap().platform_endpoint_arn(), None);
        assert_eq!(f.provider.calls().delete, 1);
    }

    #[tokio::test]
    async fn test_concurrent_registrations_do_not_duplicate() {
        let f = fixture();
        f.provider.set_latency(Duration::from_millis(10));

        let a = f.registrar.clone();
        let b = f.registrar.clone();
        let device = token(&[1]);
        let (first, second) = tokio::join!(
            a.register_device_token(&device),
            b.register_device_token(&device)
        );

        assert_eq!(first.unwrap().arn, second.unwrap().arn);
        assert_eq!(f.provider.endpoint_count(), 1);
    }
}
