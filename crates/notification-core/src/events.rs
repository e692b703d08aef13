//! Domain event names and typed payloads.
//!
//! Each event type carries its own payload record. Raw `(type, payload)`
//! pairs coming from outside the process are validated here, before
//! anything reaches a bus subscriber.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::EventError;
use crate::types::NotificationType;

// -- Event name constants --

pub const ADMIN_REGISTERED: &str = "admin.registered";
pub const ADMIN_LOGIN: &str = "admin.login";
pub const ADMIN_LOGOUT: &str = "admin.logout";
pub const BUS_CREATED: &str = "bus.created";
pub const BUS_UPDATED: &str = "bus.updated";
pub const BUS_DELETED: &str = "bus.deleted";
pub const PROFILE_UPDATED: &str = "profile.updated";
pub const TICKET_CREATED: &str = "ticket_created";
pub const BOOKING_CONFIRMED: &str = "booking_confirmed";
pub const SYSTEM_INFO: &str = "system.info";
pub const SYSTEM_SUCCESS: &str = "system.success";
pub const SYSTEM_WARNING: &str = "system.warning";
pub const SYSTEM_ERROR: &str = "system.error";

/// Discriminant of [`DomainEvent`], used as the bus subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AdminRegistered,
    AdminLogin,
    AdminLogout,
    BusCreated,
    BusUpdated,
    BusDeleted,
    ProfileUpdated,
    TicketCreated,
    BookingConfirmed,
    SystemInfo,
    SystemSuccess,
    SystemWarning,
    SystemError,
}

impl EventKind {
    pub const ALL: [EventKind; 13] = [
        Self::AdminRegistered,
        Self::AdminLogin,
        Self::AdminLogout,
        Self::BusCreated,
        Self::BusUpdated,
        Self::BusDeleted,
        Self::ProfileUpdated,
        Self::TicketCreated,
        Self::BookingConfirmed,
        Self::SystemInfo,
        Self::SystemSuccess,
        Self::SystemWarning,
        Self::SystemError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AdminRegistered => ADMIN_REGISTERED,
            Self::AdminLogin => ADMIN_LOGIN,
            Self::AdminLogout => ADMIN_LOGOUT,
            Self::BusCreated => BUS_CREATED,
            Self::BusUpdated => BUS_UPDATED,
            Self::BusDeleted => BUS_DELETED,
            Self::ProfileUpdated => PROFILE_UPDATED,
            Self::TicketCreated => TICKET_CREATED,
            Self::BookingConfirmed => BOOKING_CONFIRMED,
            Self::SystemInfo => SYSTEM_INFO,
            Self::SystemSuccess => SYSTEM_SUCCESS,
            Self::SystemWarning => SYSTEM_WARNING,
            Self::SystemError => SYSTEM_ERROR,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Payload types --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminIdentity {
    pub admin_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRef {
    pub admin_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusChange {
    pub bus_name: String,
    pub route: String,
    pub admin_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChange {
    pub admin_name: String,
    pub updated_fields: Vec<String>,
}

/// Pre-formatted title and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub title: String,
    pub message: String,
}

impl Announcement {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Unit carried on the local event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "payload")]
pub enum DomainEvent {
    #[serde(rename = "admin.registered")]
    AdminRegistered(AdminIdentity),
    #[serde(rename = "admin.login")]
    AdminLogin(AdminIdentity),
    #[serde(rename = "admin.logout")]
    AdminLogout(AdminRef),
    #[serde(rename = "bus.created")]
    BusCreated(BusChange),
    #[serde(rename = "bus.updated")]
    BusUpdated(BusChange),
    #[serde(rename = "bus.deleted")]
    BusDeleted(BusChange),
    #[serde(rename = "profile.updated")]
    ProfileUpdated(ProfileChange),
    #[serde(rename = "ticket_created")]
    TicketCreated(Announcement),
    #[serde(rename = "booking_confirmed")]
    BookingConfirmed(Announcement),
    #[serde(rename = "system.info")]
    SystemInfo(Announcement),
    #[serde(rename = "system.success")]
    SystemSuccess(Announcement),
    #[serde(rename = "system.warning")]
    SystemWarning(Announcement),
    #[serde(rename = "system.error")]
    SystemError(Announcement),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AdminRegistered(_) => EventKind::AdminRegistered,
            Self::AdminLogin(_) => EventKind::AdminLogin,
            Self::AdminLogout(_) => EventKind::AdminLogout,
            Self::BusCreated(_) => EventKind::BusCreated,
            Self::BusUpdated(_) => EventKind::BusUpdated,
            Self::BusDeleted(_) => EventKind::BusDeleted,
            Self::ProfileUpdated(_) => EventKind::ProfileUpdated,
            Self::TicketCreated(_) => EventKind::TicketCreated,
            Self::BookingConfirmed(_) => EventKind::BookingConfirmed,
            Self::SystemInfo(_) => EventKind::SystemInfo,
            Self::SystemSuccess(_) => EventKind::SystemSuccess,
            Self::SystemWarning(_) => EventKind::SystemWarning,
            Self::SystemError(_) => EventKind::SystemError,
        }
    }

    /// System-class event at the given severity.
    pub fn system(level: NotificationType, announcement: Announcement) -> Self {
        match level {
            NotificationType::Success => Self::SystemSuccess(announcement),
            NotificationType::Info => Self::SystemInfo(announcement),
            NotificationType::Warning => Self::SystemWarning(announcement),
            NotificationType::Error => Self::SystemError(announcement),
        }
    }

    /// Validate a raw `(event_type, payload)` pair into a typed event.
    pub fn from_raw(event_type: &str, payload: Value) -> Result<Self, EventError> {
        if EventKind::parse(event_type).is_none() {
            return Err(EventError::UnknownType(event_type.to_string()));
        }
        let event: DomainEvent =
            serde_json::from_value(json!({ "eventType": event_type, "payload": payload }))
                .map_err(|e| EventError::InvalidPayload {
                    event_type: event_type.to_string(),
                    reason: e.to_string(),
                })?;
        event.validate()?;
        Ok(event)
    }

    /// Required string fields must be non-blank.
    pub fn validate(&self) -> Result<(), EventError> {
        let required: Vec<(&str, &str)> = match self {
            Self::AdminRegistered(p) | Self::AdminLogin(p) => {
                vec![("adminName", p.admin_name.as_str()), ("email", p.email.as_str())]
            }
            Self::AdminLogout(p) => vec![("adminName", p.admin_name.as_str())],
            Self::BusCreated(p) | Self::BusUpdated(p) | Self::BusDeleted(p) => vec![
                ("busName", p.bus_name.as_str()),
                ("route", p.route.as_str()),
                ("adminName", p.admin_name.as_str()),
            ],
            Self::ProfileUpdated(p) => vec![("adminName", p.admin_name.as_str())],
            Self::TicketCreated(p)
            | Self::BookingConfirmed(p)
            | Self::SystemInfo(p)
            | Self::SystemSuccess(p)
            | Self::SystemWarning(p)
            | Self::SystemError(p) => vec![("title", p.title.as_str()), ("message", p.message.as_str())],
        };

        match required.into_iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(EventError::InvalidPayload {
                event_type: self.kind().as_str().to_string(),
                reason: format!("{field} must not be empty"),
            }),
            None => Ok(()),
        }
    }
}
