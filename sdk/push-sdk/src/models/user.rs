use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SdkError};

/// Opaque push token issued by the platform push service
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceToken(Vec<u8>);

impl DeviceToken {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex form expected by the provider
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl std::fmt::Debug for DeviceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex = self.to_hex();
        write!(f, "DeviceToken({}..)", &hex[..hex.len().min(8)])
    }
}

/// Provider-side mapping between a device and a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEndpoint {
    pub arn: String,
    pub user_id: String,
}

/// The signed-in user
///
/// `platform_endpoint_arn` is only written by the endpoint registrar; payload
/// merges never touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub handle: String,
    pub phone_number: Option<String>,
    pub verified: bool,
    pub auth_code: Option<String>,
    pub last_read_messages_at: Option<DateTime<Utc>>,
    platform_endpoint_arn: Option<String>,
}

/// Fields read from a server payload; `None` means absent or null
#[derive(Default)]
struct UserFields {
    user_id: Option<String>,
    handle: Option<String>,
    phone_number: Option<String>,
    verified: Option<bool>,
    auth_code: Option<String>,
    last_read_messages_at: Option<DateTime<Utc>>,
    platform_endpoint_arn: Option<String>,
}

impl UserRecord {
    pub fn new(user_id: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            handle: handle.into(),
            phone_number: None,
            verified: false,
            auth_code: None,
            last_read_messages_at: None,
            platform_endpoint_arn: None,
        }
    }

    /// Build a record from a server payload. `id` (or `user_id`) is required.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self> {
        let fields = UserFields::read(payload)?;
        let user_id = fields
            .user_id
            .clone()
            .ok_or_else(|| SdkError::Parse("user payload has no id".to_string()))?;

        let mut record = UserRecord::new(user_id, "");
        record.platform_endpoint_arn = fields.platform_endpoint_arn.clone();
        record.merge(fields);
        Ok(record)
    }

    /// Merge a server payload into this record. Absent keys keep their values.
    ///
    /// The payload is validated in full before anything is written.
    pub fn apply_payload(&mut self, payload: &Map<String, Value>) -> Result<()> {
        let fields = UserFields::read(payload)?;
        self.merge(fields);
        Ok(())
    }

    pub fn platform_endpoint_arn(&self) -> Option<&str> {
        self.platform_endpoint_arn.as_deref()
    }

    pub(crate) fn set_platform_endpoint_arn(&mut self, arn: Option<String>) {
        self.platform_endpoint_arn = arn;
    }

    pub fn platform_endpoint(&self) -> Option<PlatformEndpoint> {
        self.platform_endpoint_arn.as_ref().map(|arn| PlatformEndpoint {
            arn: arn.clone(),
            user_id: self.user_id.clone(),
        })
    }

    fn merge(&mut self, fields: UserFields) {
        if let Some(handle) = fields.handle {
            self.handle = handle;
        }
        if let Some(phone_number) = fields.phone_number {
            self.phone_number = Some(phone_number);
        }
        if let Some(verified) = fields.verified {
            self.verified = verified;
        }
        if let Some(auth_code) = fields.auth_code {
            self.auth_code = Some(auth_code);
        }
        if let Some(at) = fields.last_read_messages_at {
            self.last_read_messages_at = Some(at);
        }
    }
}

impl UserFields {
    fn read(payload: &Map<String, Value>) -> Result<Self> {
        let user_id = match string_field(payload, "id")? {
            Some(id) => Some(id),
            None => string_field(payload, "user_id")?,
        };

        let last_read_messages_at = match string_field(payload, "last_read_messages_date")? {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| SdkError::Parse(format!("last_read_messages_date: {e}")))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        let verified = match payload.get("verified") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(other) => {
                return Err(SdkError::Parse(format!(
                    "verified must be a boolean, got {other}"
                )))
            }
        };

        Ok(Self {
            user_id,
            handle: string_field(payload, "handle")?,
            phone_number: string_field(payload, "phone_number")?,
            verified,
            auth_code: string_field(payload, "auth_code")?,
            last_read_messages_at,
            platform_endpoint_arn: string_field(payload, "platform_endpoint_arn")?,
        })
    }
}

/// Strings are taken as-is, numbers are stringified (servers send numeric ids)
fn string_field(payload: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match payload.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(SdkError::Parse(format!(
            "{key} must be a string, got {other}"
        ))),
    }
}
