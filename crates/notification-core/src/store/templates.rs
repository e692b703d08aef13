//! Domain event → notification text.

use crate::events::{BusChange, DomainEvent};
use crate::types::{NotificationSpec, NotificationType};

/// Build the notification content for `event`.
pub fn render(event: &DomainEvent) -> NotificationSpec {
    use NotificationType::{Error, Info, Success, Warning};

    match event {
        DomainEvent::AdminRegistered(p) => NotificationSpec::new(
            Success,
            "New Admin Registered",
            format!("{} ({}) registered as an administrator.", p.admin_name, p.email),
        ),
        DomainEvent::AdminLogin(p) => NotificationSpec::new(
            Info,
            "Admin Login",
            format!("{} signed in ({}).", p.admin_name, p.email),
        ),
        DomainEvent::AdminLogout(p) => {
            NotificationSpec::new(Info, "Admin Logout", format!("{} signed out.", p.admin_name))
        }
        DomainEvent::BusCreated(p) => NotificationSpec::new(Success, "Bus Added", bus_line(p, "added")),
        DomainEvent::BusUpdated(p) => {
            NotificationSpec::new(Info, "Bus Updated", bus_line(p, "updated"))
        }
        DomainEvent::BusDeleted(p) => {
            NotificationSpec::new(Warning, "Bus Deleted", bus_line(p, "removed"))
        }
        DomainEvent::ProfileUpdated(p) => {
            let fields: Vec<&str> = p
                .updated_fields
                .iter()
                .map(|f| f.trim())
                .filter(|f| !f.is_empty())
                .collect();
            let what = if fields.is_empty() {
                "their profile".to_string()
            } else {
                fields.join(", ")
            };
            NotificationSpec::new(
                Info,
                "Profile Updated",
                format!("{} updated {what}.", p.admin_name),
            )
        }
        DomainEvent::TicketCreated(a) | DomainEvent::BookingConfirmed(a) => {
            NotificationSpec::new(Success, a.title.clone(), a.message.clone())
        }
        DomainEvent::SystemInfo(a) => NotificationSpec::new(Info, a.title.clone(), a.message.clone()),
        DomainEvent::SystemSuccess(a) => {
            NotificationSpec::new(Success, a.title.clone(), a.message.clone())
        }
        DomainEvent::SystemWarning(a) => {
            NotificationSpec::new(Warning, a.title.clone(), a.message.clone())
        }
        DomainEvent::SystemError(a) => {
            NotificationSpec::new(Error, a.title.clone(), a.message.clone())
        }
    }
}

fn bus_line(p: &BusChange, verb: &str) -> String {
    format!(
        "{} on route {} was {verb} by {}.",
        p.bus_name, p.route, p.admin_name
    )
}
