//! Configuration: defaults, validation, loading from the environment.

pub mod app_config;
pub mod defaults;
pub mod validation;

pub use app_config::AppConfig;

use serde::{Deserialize, Serialize};

/// Feature availability status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureStatus {
    pub push_configured: bool,
    pub token_provider_configured: bool,
    pub missing_settings: Vec<String>,
    pub warnings: Vec<String>,
}
