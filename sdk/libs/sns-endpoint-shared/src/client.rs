use std::collections::HashMap;

use aws_config::BehaviorVersion;
use aws_sdk_sns::config::Region;
use aws_sdk_sns::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_sns::Client as SnsClient;
use tracing::{debug, info, warn};

use crate::errors::EndpointError;
use crate::models::EndpointAttributes;
use crate::provider::{token_prefix, EndpointProvider};

/// Amazon SNS platform endpoint client
///
/// Uses AWS credentials from the default provider chain (environment
/// variables, shared credentials file, or an instance/role profile).
#[derive(Clone)]
pub struct SnsEndpointClient {
    client: SnsClient,
}

impl SnsEndpointClient {
    /// Create a new client with the default AWS configuration
    ///
    /// # Arguments
    /// * `region` - Region override; the default chain decides when `None`
    pub async fn new(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;

        info!(
            region = ?config.region(),
            "Initialized SNS platform endpoint client"
        );

        Self::from_client(SnsClient::new(&config))
    }

    /// Wrap an already configured SNS client
    pub fn from_client(client: SnsClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl EndpointProvider for SnsEndpointClient {
    async fn create_platform_endpoint(
        &self,
        application_arn: &str,
        token: &str,
        custom_user_data: Option<&str>,
    ) -> Result<String, EndpointError> {
        debug!(token = %token_prefix(token), "Creating SNS platform endpoint");

        let result = self
            .client
            .create_platform_endpoint()
            .platform_application_arn(application_arn)
            .token(token)
            .set_custom_user_data(custom_user_data.map(str::to_string))
            .send()
            .await;

        match result {
            Ok(output) => output.endpoint_arn().map(str::to_string).ok_or_else(|| {
                EndpointError::Internal("CreatePlatformEndpoint returned no ARN".to_string())
            }),
            Err(e) => {
                let err = classify(e);
                // SNS refuses to create a second endpoint for a token it already
                // knows under different attributes, and names the existing ARN.
                if let EndpointError::InvalidParameter(message) = &err {
                    if let Some(arn) = existing_endpoint_arn(message) {
                        info!(arn = %arn, "Reusing existing SNS endpoint for token");
                        return Ok(arn);
                    }
                }
                warn!(token = %token_prefix(token), error = %err, "SNS endpoint creation failed");
                Err(err)
            }
        }
    }

    async fn get_endpoint_attributes(&self, arn: &str) -> Result<EndpointAttributes, EndpointError> {
        let output = self
            .client
            .get_endpoint_attributes()
            .endpoint_arn(arn)
            .send()
            .await
            .map_err(classify)?;

        let attributes = match output.attributes() {
            Some(map) => EndpointAttributes::from_map(map),
            None => EndpointAttributes::from_map(&HashMap::new()),
        };

        Ok(attributes)
    }

    async fn update_platform_endpoint(
        &self,
        arn: &str,
        token: &str,
        custom_user_data: Option<&str>,
    ) -> Result<(), EndpointError> {
        let mut request = self
            .client
            .set_endpoint_attributes()
            .endpoint_arn(arn)
            .attributes("Token", token)
            .attributes("Enabled", "true");
        if let Some(data) = custom_user_data {
            request = request.attributes("CustomUserData", data);
        }

        request
            .send()
            .await
            .map_err(classify)?;

        info!(arn = %arn, token = %token_prefix(token), "Updated SNS endpoint token");
        Ok(())
    }

    async fn delete_platform_endpoint(&self, arn: &str) -> Result<(), EndpointError> {
        self.client
            .delete_endpoint()
            .endpoint_arn(arn)
            .send()
            .await
            .map_err(classify)?;

        info!(arn = %arn, "Deleted SNS endpoint");
        Ok(())
    }
}

/// Classify an SDK failure: service errors by code, everything on the wire as transport
fn classify<E, R>(err: SdkError<E, R>) -> EndpointError
where
    E: ProvideErrorMetadata,
{
    match &err {
        SdkError::ServiceError(ctx) => {
            EndpointError::from_code(ctx.err().code(), ctx.err().message())
        }
        SdkError::TimeoutError(_) => EndpointError::Transport("request timed out".to_string()),
        SdkError::DispatchFailure(_) => {
            EndpointError::Transport("request could not be dispatched".to_string())
        }
        SdkError::ResponseError(_) => {
            EndpointError::Transport("response could not be parsed".to_string())
        }
        SdkError::ConstructionFailure(_) => {
            EndpointError::Internal("request could not be constructed".to_string())
        }
        _ => EndpointError::Internal("unclassified SDK error".to_string()),
    }
}

/// Extract the ARN from SNS's "Endpoint <arn> already exists with the same Token" message
fn existing_endpoint_arn(message: &str) -> Option<String> {
    let start = message.find("Endpoint ")? + "Endpoint ".len();
    let rest = &message[start..];
    let end = rest.find(" already exists")?;
    let arn = rest[..end].trim();

    if arn.starts_with("arn:") {
        Some(arn.to_string())
    } else {
        None
    }
}
