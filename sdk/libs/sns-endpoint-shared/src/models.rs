use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attributes of a platform endpoint as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointAttributes {
    pub token: String,
    pub enabled: bool,
    pub custom_user_data: Option<String>,
}

impl EndpointAttributes {
    /// Build from the raw SNS attribute map (`Token`, `Enabled`, `CustomUserData`)
    pub fn from_map(attributes: &HashMap<String, String>) -> Self {
        Self {
            token: attributes.get("Token").cloned().unwrap_or_default(),
            enabled: attributes
                .get("Enabled")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            custom_user_data: attributes.get("CustomUserData").cloned(),
        }
    }

    /// Whether the endpoint must be rewritten to deliver to `token` on behalf
    /// of `custom_user_data`
    ///
    /// `None` leaves the stored user data out of the comparison.
    pub fn needs_update(&self, token: &str, custom_user_data: Option<&str>) -> bool {
        self.token != token
            || !self.enabled
            || custom_user_data.map_or(false, |data| self.custom_user_data.as_deref() != Some(data))
    }
}
