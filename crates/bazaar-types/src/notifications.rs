use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stored in the `type` column of the notifications table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewMessage,
    AdView,
    ServiceView,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewMessage => "new_message",
            Self::AdView => "ad_view",
            Self::ServiceView => "service_view",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new_message" => Some(Self::NewMessage),
            "ad_view" => Some(Self::AdView),
            "service_view" => Some(Self::ServiceView),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessageData {
    pub sender_id: i64,
    pub sender_username: String,
    pub conversation_id: i64,
}

/// Kind-specific payload of a notification.
///
/// On the wire this is the pair `"type"` / `"additional_data"`; kinds without
/// a payload omit `additional_data` entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "additional_data", rename_all = "snake_case")]
pub enum NotificationData {
    NewMessage(NewMessageData),
    AdView,
    ServiceView,
}

#[derive(Debug, Error)]
pub enum NotificationDecodeError {
    #[error("unknown notification type '{0}'")]
    UnknownKind(String),
    #[error("missing additional_data for '{0}' notification")]
    MissingPayload(&'static str),
    #[error("malformed additional_data: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl NotificationData {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::NewMessage(_) => NotificationKind::NewMessage,
            Self::AdView => NotificationKind::AdView,
            Self::ServiceView => NotificationKind::ServiceView,
        }
    }

    /// JSON for the `additional_data` column, `None` for kinds without a payload.
    pub fn payload_json(&self) -> Result<Option<String>, serde_json::Error> {
        match self {
            Self::NewMessage(data) => serde_json::to_string(data).map(Some),
            Self::AdView | Self::ServiceView => Ok(None),
        }
    }

    /// Rebuild the payload from the stored `type` and `additional_data` columns.
    pub fn from_stored(kind: &str, payload: Option<&str>) -> Result<Self, NotificationDecodeError> {
        let kind = NotificationKind::parse(kind)
            .ok_or_else(|| NotificationDecodeError::UnknownKind(kind.to_string()))?;

        match kind {
            NotificationKind::NewMessage => {
                let raw = payload.ok_or(NotificationDecodeError::MissingPayload(kind.as_str()))?;
                Ok(Self::NewMessage(serde_json::from_str(raw)?))
            }
            NotificationKind::AdView => Ok(Self::AdView),
            NotificationKind::ServiceView => Ok(Self::ServiceView),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    #[serde(flatten)]
    pub data: NotificationData,
    pub content: String,
    pub related_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
