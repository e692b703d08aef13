//! Runtime application configuration loaded from the environment.

use std::time::Duration;

use notification_core::StoreConfig;
use push_client::Permission;

use super::defaults::get_default;
use super::validation::{split_list, validate_setting};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub push_instance_id: String,
    pub push_api_url: Option<String>,
    pub push_agent_url: Option<String>,
    pub push_token_provider_url: Option<String>,
    pub push_user_id: Option<String>,
    pub push_interests: Vec<String>,
    pub notification_permission: Permission,
    pub notification_auto_grant: bool,
    pub notification_capacity: usize,
    pub notification_duration_ms: u64,
    pub notification_auto_hide: bool,
    pub notification_dedup_window_ms: u64,
    pub connection_poll_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 8080,
            push_instance_id: String::new(),
            push_api_url: None,
            push_agent_url: None,
            push_token_provider_url: None,
            push_user_id: None,
            push_interests: vec![push_client::DEFAULT_INTEREST.to_string()],
            notification_permission: Permission::Default,
            notification_auto_grant: true,
            notification_capacity: 50,
            notification_duration_ms: 5_000,
            notification_auto_hide: true,
            notification_dedup_window_ms: 1_500,
            connection_poll_interval_secs: 5,
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn load() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Missing keys take their default. Invalid values are logged and
    /// replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let g = |key: &str| -> String {
            let default = get_default(key).unwrap_or_default();
            let Some(raw) = lookup(key) else {
                return default.to_string();
            };
            let value = raw.trim();
            if value.is_empty() {
                return default.to_string();
            }
            match validate_setting(key, value) {
                Ok(()) => value.to_string(),
                Err(e) => {
                    tracing::warn!(key, value, error = %e, "Invalid setting, using default");
                    default.to_string()
                }
            }
        };
        let opt = |key: &str| -> Option<String> {
            let v = g(key);
            (!v.is_empty()).then_some(v)
        };

        Self {
            server_port: parse_num(&g("SERVER_PORT"), 8080),
            push_instance_id: g("PUSH_INSTANCE_ID"),
            push_api_url: opt("PUSH_API_URL"),
            push_agent_url: opt("PUSH_AGENT_URL"),
            push_token_provider_url: opt("PUSH_TOKEN_PROVIDER_URL"),
            push_user_id: opt("PUSH_USER_ID"),
            push_interests: split_list(&g("PUSH_INTERESTS"))
                .map(str::to_string)
                .collect(),
            notification_permission: Permission::from_str_setting(&g("NOTIFICATION_PERMISSION")),
            notification_auto_grant: g("NOTIFICATION_AUTO_GRANT") == "true",
            notification_capacity: parse_num(&g("NOTIFICATION_CAPACITY"), 50),
            notification_duration_ms: parse_num(&g("NOTIFICATION_DURATION_MS"), 5_000),
            notification_auto_hide: g("NOTIFICATION_AUTO_HIDE") == "true",
            notification_dedup_window_ms: parse_num(&g("NOTIFICATION_DEDUP_WINDOW_MS"), 1_500),
            connection_poll_interval_secs: parse_num(&g("CONNECTION_POLL_INTERVAL_SECS"), 5),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            capacity: self.notification_capacity,
            event_auto_hide: self.notification_auto_hide,
            event_duration: Duration::from_millis(self.notification_duration_ms),
            dedup_window: Duration::from_millis(self.notification_dedup_window_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.connection_poll_interval_secs.max(1))
    }
}

fn parse_num<T: std::str::FromStr>(s: &str, default: T) -> T {
    if s.is_empty() {
        return default;
    }
    s.parse().unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.push_interests, vec!["admin-notifications"]);
        assert_eq!(config.notification_permission, Permission::Default);
        assert!(config.notification_auto_hide);
        assert!(config.push_agent_url.is_none());

        let store = config.store_config();
        assert_eq!(store.capacity, 50);
        assert_eq!(store.event_duration, Duration::from_millis(5_000));
        assert_eq!(store.dedup_window, Duration::from_millis(1_500));
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn values_override_defaults() {
        let config = from_pairs(&[
            ("SERVER_PORT", "9100"),
            ("PUSH_INSTANCE_ID", "inst-1"),
            ("PUSH_AGENT_URL", "ws://127.0.0.1:9/agent"),
            ("PUSH_INTERESTS", "admin-notifications, drivers"),
            ("NOTIFICATION_PERMISSION", "denied"),
            ("NOTIFICATION_AUTO_HIDE", "false"),
            ("NOTIFICATION_DEDUP_WINDOW_MS", "0"),
        ]);
        assert_eq!(config.server_port, 9100);
        assert_eq!(config.push_instance_id, "inst-1");
        assert_eq!(config.push_agent_url.as_deref(), Some("ws://127.0.0.1:9/agent"));
        assert_eq!(config.push_interests, vec!["admin-notifications", "drivers"]);
        assert_eq!(config.notification_permission, Permission::Denied);
        assert!(!config.notification_auto_hide);
        assert!(config.store_config().dedup_window.is_zero());
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = from_pairs(&[
            ("SERVER_PORT", "not-a-port"),
            ("NOTIFICATION_CAPACITY", "0"),
            ("PUSH_AGENT_URL", "http://wrong-scheme"),
            ("NOTIFICATION_AUTO_GRANT", "maybe"),
        ]);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.notification_capacity, 50);
        assert!(config.push_agent_url.is_none());
        assert!(config.notification_auto_grant);
    }
}
