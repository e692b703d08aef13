//! Setting value validation.

use push_client::manager::validate_interest;

use super::{AppConfig, FeatureStatus};

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "SERVER_PORT" => {
            let v: u16 = value.parse().map_err(|_| "must be a port number")?;
            if v == 0 {
                return Err("must be between 1 and 65535".into());
            }
        }
        "PUSH_API_URL" | "PUSH_TOKEN_PROVIDER_URL" => {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err("must be an http(s) URL".into());
            }
        }
        "PUSH_AGENT_URL" => {
            if !value.starts_with("ws://") && !value.starts_with("wss://") {
                return Err("must be a ws(s) URL".into());
            }
        }
        "PUSH_INTERESTS" => {
            for interest in split_list(value) {
                validate_interest(interest).map_err(|e| e.to_string())?;
            }
        }
        "NOTIFICATION_PERMISSION" => {
            if !["default", "granted", "denied"].contains(&value) {
                return Err("must be default, granted, or denied".into());
            }
        }
        "NOTIFICATION_CAPACITY" => validate_int_range(value, 1, 1000)?,
        "NOTIFICATION_DURATION_MS" => validate_int_range(value, 100, 600_000)?,
        "NOTIFICATION_DEDUP_WINDOW_MS" => validate_int_range(value, 0, 60_000)?,
        "CONNECTION_POLL_INTERVAL_SECS" => validate_int_range(value, 1, 3600)?,
        k if is_boolean_setting(k) => {
            if value != "true" && value != "false" {
                return Err("must be 'true' or 'false'".into());
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_int_range(value: &str, min: u64, max: u64) -> Result<(), String> {
    let v: u64 = value.parse().map_err(|_| "must be a non-negative integer")?;
    if v < min || v > max {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}

fn is_boolean_setting(key: &str) -> bool {
    matches!(key, "NOTIFICATION_AUTO_GRANT" | "NOTIFICATION_AUTO_HIDE")
}

/// Split a comma-separated list, dropping blanks.
pub fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Report which features the loaded configuration enables.
pub fn check_feature_status(config: &AppConfig) -> FeatureStatus {
    let mut status = FeatureStatus {
        push_configured: true,
        token_provider_configured: config.push_token_provider_url.is_some(),
        missing_settings: Vec::new(),
        warnings: Vec::new(),
    };

    if config.push_instance_id.is_empty() {
        status.missing_settings.push("PUSH_INSTANCE_ID".into());
        status.push_configured = false;
    }
    if config.push_agent_url.is_none() {
        status.missing_settings.push("PUSH_AGENT_URL".into());
        status.push_configured = false;
    }

    if config.push_user_id.is_some() && config.push_token_provider_url.is_none() {
        status
            .warnings
            .push("PUSH_USER_ID is set without PUSH_TOKEN_PROVIDER_URL; registration stays anonymous".into());
    }
    if config.notification_permission == push_client::Permission::Denied {
        status
            .warnings
            .push("Notification permission is denied; only local events are shown".into());
    }
    if config.push_interests.is_empty() {
        status.warnings.push("No push interests configured".into());
    }

    status
}
