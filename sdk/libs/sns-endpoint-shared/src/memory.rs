use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::errors::EndpointError;
use crate::models::EndpointAttributes;
use crate::provider::{token_prefix, EndpointProvider};

/// Number of provider calls seen, per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub create: u32,
    pub get: u32,
    pub update: u32,
    pub delete: u32,
}

#[derive(Default)]
struct State {
    next_id: u64,
    endpoints: HashMap<String, EndpointAttributes>,
    transient_failures: u32,
    rejected_applications: HashSet<String>,
    latency: Option<Duration>,
    recover_existing: bool,
    calls: CallCounts,
}

impl State {
    fn take_transient_failure(&mut self) -> Result<(), EndpointError> {
        if self.transient_failures > 0 {
            self.transient_failures -= 1;
            return Err(EndpointError::Transport("injected network failure".to_string()));
        }
        Ok(())
    }
}

/// In-process platform endpoint provider
///
/// Keeps endpoints in memory under `arn:local:endpoint:<n>` ARNs. By default
/// creation is not deduplicated, so every create yields a fresh ARN; with
/// `recover_existing_on_create` it answers like SNS does for a known token
/// and hands back the existing endpoint untouched. Faults can be injected to
/// exercise retry and rejection paths.
#[derive(Default)]
pub struct InMemoryEndpointProvider {
    state: Mutex<State>,
}

impl InMemoryEndpointProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` calls with a transport error
    pub fn fail_next_transient(&self, count: u32) {
        self.state.lock().transient_failures = count;
    }

    /// Reject every creation against `application_arn`
    pub fn reject_application(&self, application_arn: &str) {
        self.state
            .lock()
            .rejected_applications
            .insert(application_arn.to_string());
    }

    /// Return the ARN of an endpoint already holding the token instead of
    /// creating a new one, leaving its attributes as they are
    pub fn recover_existing_on_create(&self, enabled: bool) {
        self.state.lock().recover_existing = enabled;
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = Some(latency);
    }

    /// Drop an endpoint as if the provider had deleted it
    pub fn remove_endpoint(&self, arn: &str) -> bool {
        self.state.lock().endpoints.remove(arn).is_some()
    }

    /// Disable an endpoint as the provider does after delivery failures
    pub fn disable_endpoint(&self, arn: &str) {
        if let Some(endpoint) = self.state.lock().endpoints.get_mut(arn) {
            endpoint.enabled = false;
        }
    }

    pub fn endpoint(&self, arn: &str) -> Option<EndpointAttributes> {
        self.state.lock().endpoints.get(arn).cloned()
    }

    pub fn endpoint_count(&self) -> usize {
        self.state.lock().endpoints.len()
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }

    async fn simulate_latency(&self) {
        let latency = self.state.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait::async_trait]
impl EndpointProvider for InMemoryEndpointProvider {
    async fn create_platform_endpoint(
        &self,
        application_arn: &str,
        token: &str,
        custom_user_data: Option<&str>,
    ) -> Result<String, EndpointError> {
        self.simulate_latency().await;
        let mut state = self.state.lock();
        state.calls.create += 1;
        state.take_transient_failure()?;

        if state.rejected_applications.contains(application_arn) {
            return Err(EndpointError::Rejected(format!(
                "platform application {application_arn} does not exist"
            )));
        }
        if token.is_empty() {
            return Err(EndpointError::InvalidParameter("Token is empty".to_string()));
        }

        if state.recover_existing {
            let existing = state
                .endpoints
                .iter()
                .find(|(_, endpoint)| endpoint.token == token)
                .map(|(arn, _)| arn.clone());
            if let Some(arn) = existing {
                debug!(arn = %arn, token = %token_prefix(token), "Returning existing in-memory endpoint");
                return Ok(arn);
            }
        }

        state.next_id += 1;
        let arn = format!("arn:local:endpoint:{}", state.next_id);
        state.endpoints.insert(
            arn.clone(),
            EndpointAttributes {
                token: token.to_string(),
                enabled: true,
                custom_user_data: custom_user_data.map(str::to_string),
            },
        );

        debug!(arn = %arn, token = %token_prefix(token), "Created in-memory endpoint");
        Ok(arn)
    }

    async fn get_endpoint_attributes(&self, arn: &str) -> Result<EndpointAttributes, EndpointError> {
        self.simulate_latency().await;
        let mut state = self.state.lock();
        state.calls.get += 1;
        state.take_transient_failure()?;

        state
            .endpoints
            .get(arn)
            .cloned()
            .ok_or_else(|| EndpointError::NotFound(arn.to_string()))
    }

    async fn update_platform_endpoint(
        &self,
        arn: &str,
        token: &str,
        custom_user_data: Option<&str>,
    ) -> Result<(), EndpointError> {
        self.simulate_latency().await;
        let mut state = self.state.lock();
        state.calls.update += 1;
        state.take_transient_failure()?;

        let endpoint = state
            .endpoints
            .get_mut(arn)
            .ok_or_else(|| EndpointError::NotFound(arn.to_string()))?;
        endpoint.token = token.to_string();
        endpoint.enabled = true;
        if let Some(data) = custom_user_data {
            endpoint.custom_user_data = Some(data.to_string());
        }
        Ok(())
    }

    async fn delete_platform_endpoint(&self, arn: &str) -> Result<(), EndpointError> {
        self.simulate_latency().await;
        let mut state = self.state.lock();
        state.calls.delete += 1;
        state.take_transient_failure()?;

        // Deleting a missing endpoint succeeds, as with SNS
        state.endpoints.remove(arn);
        Ok(())
    }
}
