use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::error::{Result, SdkError};

/// Notification type tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A new message arrived in a conversation
    NewMessage,
    /// Messages were read on another device
    MessageRead,
    /// Conversation metadata changed
    ConversationUpdate,
    /// Broadcast to everyone on a channel
    ChannelBroadcast,
    /// Any tag this SDK version does not know; kept for forward compatibility
    Other(String),
}

impl NotificationKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "new_message" => NotificationKind::NewMessage,
            "message_read" => NotificationKind::MessageRead,
            "conversation_update" => NotificationKind::ConversationUpdate,
            "channel_broadcast" => NotificationKind::ChannelBroadcast,
            other => NotificationKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::NewMessage => "new_message",
            NotificationKind::MessageRead => "message_read",
            NotificationKind::ConversationUpdate => "conversation_update",
            NotificationKind::ChannelBroadcast => "channel_broadcast",
            NotificationKind::Other(tag) => tag,
        }
    }
}

/// One parsed notification record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub conversation_id: Option<String>,
    /// Alert text from `aps.alert`
    pub alert: Option<String>,
    /// The record as received
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl Notification {
    /// Parse a single record. A string `type` is required.
    pub fn from_object(record: &Map<String, Value>) -> Result<Self> {
        let tag = match record.get("type") {
            Some(Value::String(tag)) if !tag.is_empty() => tag,
            Some(other) => {
                return Err(SdkError::Parse(format!(
                    "notification type must be a non-empty string, got {other}"
                )))
            }
            None => return Err(SdkError::Parse("notification has no type".to_string())),
        };

        let conversation_id = ["convo", "conversation_id"]
            .iter()
            .find_map(|key| match record.get(*key) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            });

        Ok(Self {
            id: Uuid::new_v4(),
            kind: NotificationKind::from_tag(tag),
            conversation_id,
            alert: alert_text(record),
            payload: Value::Object(record.clone()),
            received_at: Utc::now(),
        })
    }
}

/// `aps.alert` is either a string or an object with a `body`
fn alert_text(record: &Map<String, Value>) -> Option<String> {
    match record.get("aps")?.get("alert")? {
        Value::String(text) => Some(text.clone()),
        Value::Object(alert) => alert.get("body")?.as_str().map(str::to_string),
        _ => None,
    }
}

/// Notifications delivered to consumers in one batch
///
/// Immutable once built. Records that failed to parse are not in the set;
/// `dropped()` reports how many there were.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationSet {
    notifications: Vec<Notification>,
    dropped: usize,
}

impl NotificationSet {
    pub fn new(notifications: Vec<Notification>) -> Self {
        Self {
            notifications,
            dropped: 0,
        }
    }

    /// Parse an inbound provider payload.
    ///
    /// A `notifications` array yields one record per element, otherwise the
    /// object is a single record. A bare `aps` object (silent push) is an
    /// empty set. Fails when the payload is not an object or when every
    /// record in it is malformed.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let object = payload
            .as_object()
            .ok_or_else(|| SdkError::Parse(format!("payload must be an object, got {payload}")))?;

        let records: Vec<&Value> = match object.get("notifications") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(other) => {
                return Err(SdkError::Parse(format!(
                    "notifications must be an array, got {other}"
                )))
            }
            None if is_silent_push(object) => Vec::new(),
            None => vec![payload],
        };

        let total = records.len();
        let mut notifications = Vec::with_capacity(total);
        let mut last_error = None;

        for record in records {
            let parsed = match record.as_object() {
                Some(map) => Notification::from_object(map),
                None => Err(SdkError::Parse(format!("record must be an object, got {record}"))),
            };
            match parsed {
                Ok(notification) => notifications.push(notification),
                Err(e) => {
                    warn!(error = %e, "Dropping malformed notification record");
                    last_error = Some(e);
                }
            }
        }

        if total > 0 && notifications.is_empty() {
            return Err(last_error
                .unwrap_or_else(|| SdkError::Parse("no valid notification records".to_string())));
        }

        Ok(Self {
            dropped: total - notifications.len(),
            notifications,
        })
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter()
    }

    pub fn of_kind<'a>(&'a self, kind: &'a NotificationKind) -> impl Iterator<Item = &'a Notification> {
        self.notifications.iter().filter(move |n| &n.kind == kind)
    }
}

impl<'a> IntoIterator for &'a NotificationSet {
    type Item = &'a Notification;
    type IntoIter = std::slice::Iter<'a, Notification>;

    fn into_iter(self) -> Self::IntoIter {
        self.notifications.iter()
    }
}

fn is_silent_push(object: &Map<String, Value>) -> bool {
    object.len() == 1 && object.contains_key("aps")
}

/// Outcome reported to the host when background handling finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundFetchResult {
    NewData,
    NoData,
    Failed,
}

impl BackgroundFetchResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundFetchResult::NewData => "new_data",
            BackgroundFetchResult::NoData => "no_data",
            BackgroundFetchResult::Failed => "failed",
        }
    }
}
