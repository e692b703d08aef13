//! Notification record types shared with the UI.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display duration used when a spec does not name one.
pub const DEFAULT_DURATION_MS: u64 = 5_000;

/// Severity of a notification; drives toast styling on the UI side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Success,
    Info,
    Warning,
    Error,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Parse a wire value; unknown strings yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "success" => Some(Self::Success),
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// What a caller asks the store to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSpec {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub auto_hide: bool,
    #[serde(default = "default_duration_ms")]
    pub duration: u64,
}

fn default_duration_ms() -> u64 {
    DEFAULT_DURATION_MS
}

impl NotificationSpec {
    pub fn new(kind: NotificationType, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            auto_hide: false,
            duration: DEFAULT_DURATION_MS,
        }
    }

    /// Remove the notification automatically after `duration`.
    pub fn auto_hide(mut self, duration: Duration) -> Self {
        self.auto_hide = true;
        self.duration = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

/// A stored notification. Content fields never change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    pub auto_hide: bool,
    pub duration: u64,
}

impl Notification {
    pub(crate) fn from_spec(spec: NotificationSpec) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: spec.kind,
            title: spec.title,
            message: spec.message,
            timestamp: Utc::now(),
            is_read: false,
            auto_hide: spec.auto_hide,
            duration: spec.duration,
        }
    }
}

/// State delivered to store listeners after each mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSnapshot {
    /// Most recent first.
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}
