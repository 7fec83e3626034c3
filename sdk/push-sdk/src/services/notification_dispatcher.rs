/// Notification Dispatcher
///
/// Turns inbound provider payloads into `NotificationSet`s and delivers each
/// one to the registered delegate (held weakly) and to every process-wide
/// subscriber. Background deliveries report their outcome through a
/// completion that fires exactly once on every path.
use async_trait::async_trait;
use parking_lot::RwLock;
use resilience::{with_retry_if, with_timeout, with_timeout_result, ServiceConfig};
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{Result, SdkError};
use crate::models::{BackgroundFetchResult, NotificationSet};
use crate::services::completion::CompletionGuard;

/// Receives every broadcast notification set
///
/// Called on the broadcasting task; implementations should hand heavy work
/// off instead of blocking.
pub trait NotificationDelegate: Send + Sync {
    fn notifications_received(&self, notifications: &NotificationSet);
}

/// Side-effecting lookup a background payload triggers (e.g. fetching the
/// new messages it announces)
///
/// Return `SdkError::Network` for failures worth one more attempt.
#[async_trait]
pub trait BackgroundFetcher: Send + Sync {
    async fn fetch(&self, notifications: &NotificationSet) -> Result<()>;
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    delegate: RwLock<Option<Weak<dyn NotificationDelegate>>>,
    subscribers: broadcast::Sender<Arc<NotificationSet>>,
    fetchers: RwLock<Vec<Arc<dyn BackgroundFetcher>>>,
    deadline: Duration,
    fetch_policy: ServiceConfig,
}

impl NotificationDispatcher {
    /// `subscribers` is shared with the owner so subscriptions outlive any one
    /// dispatcher
    pub fn new(
        subscribers: broadcast::Sender<Arc<NotificationSet>>,
        deadline: Duration,
        fetch_policy: ServiceConfig,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                delegate: RwLock::new(None),
                subscribers,
                fetchers: RwLock::new(Vec::new()),
                deadline,
                fetch_policy,
            }),
        }
    }

    /// Replace the delegate. `None` removes it.
    pub fn set_delegate(&self, delegate: Option<Weak<dyn NotificationDelegate>>) {
        *self.inner.delegate.write() = delegate;
    }

    pub fn has_delegate(&self) -> bool {
        self.inner
            .delegate
            .read()
            .as_ref()
            .map_or(false, |weak| weak.strong_count() > 0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<NotificationSet>> {
        self.inner.subscribers.subscribe()
    }

    pub fn add_background_fetcher(&self, fetcher: Arc<dyn BackgroundFetcher>) {
        self.inner.fetchers.write().push(fetcher);
    }

    /// Deliver `notifications` to the delegate and every subscriber.
    ///
    /// A missing or dropped delegate and an absence of subscribers are both
    /// no-ops.
    pub fn broadcast(&self, notifications: NotificationSet) -> Arc<NotificationSet> {
        let notifications = Arc::new(notifications);

        let delegate = self.inner.delegate.read().as_ref().and_then(Weak::upgrade);
        match delegate {
            Some(delegate) => delegate.notifications_received(&notifications),
            None => debug!("No live delegate, skipping delegate delivery"),
        }

        match self.inner.subscribers.send(notifications.clone()) {
            Ok(receivers) => debug!(
                receivers,
                count = notifications.len(),
                "Broadcast notifications to subscribers"
            ),
            Err(_) => debug!("No subscribers for notifications"),
        }

        notifications
    }

    /// Parse and broadcast a payload received while the app is in front.
    ///
    /// Empty sets (silent pushes) are returned without being broadcast.
    pub fn handle_foreground(&self, payload: &Value) -> Result<Arc<NotificationSet>> {
        let notifications = NotificationSet::from_payload(payload)?;
        if notifications.is_empty() {
            debug!("Silent foreground push, nothing to broadcast");
            return Ok(Arc::new(notifications));
        }

        info!(
            count = notifications.len(),
            dropped = notifications.dropped(),
            "Foreground notifications received"
        );
        Ok(self.broadcast(notifications))
    }

    /// Parse, broadcast and run background fetchers, then fire `completion`.
    ///
    /// `completion` fires exactly once: with the real outcome, with `Failed`
    /// when the deadline expires, or with `Failed` from the guard if this
    /// future is dropped first.
    pub async fn handle_background<F>(&self, payload: &Value, completion: F) -> BackgroundFetchResult
    where
        F: FnOnce(BackgroundFetchResult) + Send,
    {
        let guard = CompletionGuard::new(completion, BackgroundFetchResult::Failed);

        let outcome = match with_timeout(self.inner.deadline, self.process_background(payload)).await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Background handling missed its deadline");
                BackgroundFetchResult::Failed
            }
        };

        info!(outcome = outcome.as_str(), "Background notification handled");
        guard.complete(outcome);
        outcome
    }

    async fn process_background(&self, payload: &Value) -> BackgroundFetchResult {
        let notifications = match NotificationSet::from_payload(payload) {
            Ok(notifications) => notifications,
            Err(e) => {
                warn!(error = %e, "Dropping malformed background payload");
                return BackgroundFetchResult::Failed;
            }
        };

        if notifications.is_empty() {
            return BackgroundFetchResult::NoData;
        }

        let notifications = self.broadcast(notifications);

        let fetchers = self.inner.fetchers.read().clone();
        for fetcher in fetchers {
            if let Err(e) = self.run_fetcher(fetcher.as_ref(), &notifications).await {
                warn!(error = %e, "Background fetch failed");
                return BackgroundFetchResult::Failed;
            }
        }

        BackgroundFetchResult::NewData
    }

    async fn run_fetcher(
        &self,
        fetcher: &dyn BackgroundFetcher,
        notifications: &NotificationSet,
    ) -> Result<()> {
        let policy = &self.inner.fetch_policy;
        let limit = policy.timeout.duration;

        with_retry_if(
            policy.retry.clone(),
            move || with_timeout_result::<_, _, SdkError>(limit, fetcher.fetch(notifications)),
            SdkError::is_transient,
        )
        .await
        .map_err(SdkError::from)
    }
}
