//! Setting definitions with their default values.

use std::collections::HashMap;
use std::sync::LazyLock;

type DefTuple = (&'static str, &'static str, bool, &'static str);

const DEFS: &[DefTuple] = &[
    ("SERVER_PORT", "8080", false, "HTTP/WebSocket port for UI widgets"),
    ("PUSH_INSTANCE_ID", "", true, "Push service instance identifier"),
    ("PUSH_API_URL", "", false, "Override for the push device API base URL"),
    ("PUSH_AGENT_URL", "", true, "WebSocket relay the background agent listens on"),
    ("PUSH_TOKEN_PROVIDER_URL", "", false, "Endpoint issuing per-user push tokens"),
    ("PUSH_USER_ID", "", false, "User the device registration is associated with"),
    ("PUSH_INTERESTS", "admin-notifications", false, "Comma-separated interests to subscribe"),
    ("NOTIFICATION_PERMISSION", "default", false, "Initial permission: default, granted or denied"),
    ("NOTIFICATION_AUTO_GRANT", "true", false, "Resolve a permission prompt as granted"),
    ("NOTIFICATION_CAPACITY", "50", false, "Maximum notifications kept in the store"),
    ("NOTIFICATION_DURATION_MS", "5000", false, "Auto-hide delay for event notifications"),
    ("NOTIFICATION_AUTO_HIDE", "true", false, "Auto-hide notifications derived from events"),
    ("NOTIFICATION_DEDUP_WINDOW_MS", "1500", false, "Window in which identical notifications collapse"),
    ("CONNECTION_POLL_INTERVAL_SECS", "5", false, "Connection monitor sampling interval"),
];

/// A single setting definition.
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// Setting definitions indexed by key.
pub static DEFAULT_SETTINGS: LazyLock<HashMap<&'static str, SettingDef>> = LazyLock::new(|| {
    DEFS.iter()
        .map(|&(key, default, required, description)| {
            (
                key,
                SettingDef {
                    key,
                    default,
                    required,
                    description,
                },
            )
        })
        .collect()
});

/// Get the default value for a setting key, or `None` if not defined.
pub fn get_default(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS.get(key).map(|d| d.default)
}

/// Keys in definition order.
pub fn keys() -> impl Iterator<Item = &'static str> {
    DEFS.iter().map(|&(key, ..)| key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_has_a_definition() {
        for key in keys() {
            assert!(DEFAULT_SETTINGS.contains_key(key), "{key}");
        }
        assert_eq!(DEFAULT_SETTINGS.len(), DEFS.len());
    }

    #[test]
    fn notification_defaults() {
        assert_eq!(get_default("NOTIFICATION_CAPACITY"), Some("50"));
        assert_eq!(get_default("NOTIFICATION_DURATION_MS"), Some("5000"));
        assert_eq!(get_default("PUSH_INTERESTS"), Some("admin-notifications"));
        assert_eq!(get_default("UNKNOWN"), None);
    }
}
