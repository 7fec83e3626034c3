use crate::errors::EndpointError;
use crate::models::EndpointAttributes;

/// Trait for cloud messaging providers that manage platform endpoints
///
/// ARNs are stable opaque identifiers. Updates are idempotent by ARN.
/// Creation is not guaranteed to be deduplicated for the same
/// (application, token) pair.
#[async_trait::async_trait]
pub trait EndpointProvider: Send + Sync {
    /// Creates a platform endpoint and returns its ARN
    ///
    /// # Arguments
    /// * `application_arn` - Platform application the endpoint belongs to
    /// * `token` - Hex-encoded device token
    /// * `custom_user_data` - Opaque data stored with the endpoint (the user id)
    async fn create_platform_endpoint(
        &self,
        application_arn: &str,
        token: &str,
        custom_user_data: Option<&str>,
    ) -> Result<String, EndpointError>;

    /// Reads the endpoint's current attributes
    async fn get_endpoint_attributes(&self, arn: &str) -> Result<EndpointAttributes, EndpointError>;

    /// Points an existing endpoint at `token` and re-enables it
    ///
    /// `custom_user_data`, when given, replaces the data stored with the
    /// endpoint so it names the device's current user.
    async fn update_platform_endpoint(
        &self,
        arn: &str,
        token: &str,
        custom_user_data: Option<&str>,
    ) -> Result<(), EndpointError>;

    /// Deletes the endpoint
    async fn delete_platform_endpoint(&self, arn: &str) -> Result<(), EndpointError>;
}

pub type DynEndpointProvider = std::sync::Arc<dyn EndpointProvider>;

/// Short token prefix that is safe to log
pub fn token_prefix(token: &str) -> String {
    token.chars().take(8).collect()
}
