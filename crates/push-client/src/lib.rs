//! Push-delivery client library.
//!
//! Provides the device registration lifecycle (`PushClientManager`),
//! a Beams-compatible HTTP SDK, token-provider lookups, the platform
//! seam for permission handling, and the background agent that keeps
//! receiving messages while the host UI is not focused.

pub mod agent;
pub mod beams;
pub mod manager;
pub mod platform;
pub mod sdk;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod token;

use serde::{Deserialize, Serialize};

pub use manager::PushClientManager;
pub use platform::{DesktopPlatform, PushPlatform};
pub use sdk::{PushSdk, SdkFactory};

/// Interest the admin portal subscribes to by default.
pub const DEFAULT_INTEREST: &str = "admin-notifications";

/// Delivery permission as reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    #[default]
    Default,
}

impl Permission {
    pub fn from_str_setting(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "granted" => Self::Granted,
            "denied" => Self::Denied,
            _ => Self::Default,
        }
    }

    /// Granted and denied are final; the platform never asks again.
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Default)
    }
}

/// Registration lifecycle of the push client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    Uninitialized,
    Initializing,
    Started,
    Stopped,
    Failed,
}

impl RegistrationState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

/// Unified error type for the push-client crate.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Platform does not support background messaging")]
    UnsupportedPlatform,

    #[error("Push SDK initialization failed: {0}")]
    SdkInit(String),

    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Push client is not started")]
    NotStarted,

    #[error("Invalid interest name: {0:?}")]
    InvalidInterest(String),

    #[error("Invalid auth token: {0}")]
    InvalidToken(String),

    #[error("Push API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection timeout")]
    Timeout,

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Background agent error: {0}")]
    Agent(String),
}

impl PushError {
    pub(crate) fn is_auth_error(&self) -> bool {
        matches!(
            self,
            PushError::Api {
                status: 401 | 403,
                ..
            }
        )
    }
}
