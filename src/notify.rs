use async_trait::async_trait;
use serde::Serialize;

use crate::model::{Message, Reservation};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("no deliverable recipient")]
    NoRecipient,
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// A message for a person, transport-agnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    /// Ordered label/value pairs for the message body.
    pub body_fields: Vec<(String, String)>,
}

/// Delivers notifications. Implementations must be safe to call from a
/// spawned task; callers never wait on or surface the outcome.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotifyError> {
        if notification.to.trim().is_empty() {
            return Err(NotifyError::NoRecipient);
        }
        tracing::info!(
            to = %notification.to,
            subject = %notification.subject,
            fields = notification.body_fields.len(),
            "notification"
        );
        Ok(())
    }
}

/// Where a booking confirmation goes: the owner's email, else the
/// counterpart contact when it looks like an email address.
pub fn confirmation_recipient(reservation: &Reservation, owner_email: Option<&str>) -> Option<String> {
    if let Some(email) = owner_email.map(str::trim).filter(|e| !e.is_empty()) {
        return Some(email.to_string());
    }
    let contact = reservation.counterpart_contact.trim();
    if contact.contains('@') {
        Some(contact.to_string())
    } else {
        None
    }
}

/// Confirmation message for a freshly written reservation.
pub fn booking_confirmation(reservation: &Reservation, to: String) -> Notification {
    let dates = if reservation.start_date == reservation.end_date {
        reservation.start_date.to_string()
    } else {
        format!("{} to {}", reservation.start_date, reservation.end_date)
    };

    let mut body_fields = vec![
        ("Guest".to_string(), reservation.counterpart_name.clone()),
        ("Dates".to_string(), dates.clone()),
    ];
    if let (Some(start), Some(end)) = (reservation.start_time, reservation.end_time) {
        body_fields.push((
            "Time".to_string(),
            format!("{} - {}", start.format("%H:%M"), end.format("%H:%M")),
        ));
    }
    body_fields.push(("Type".to_string(), reservation.category.label().to_string()));
    body_fields.push(("Amount".to_string(), format!("${}", reservation.amount)));
    body_fields.push(("Contact".to_string(), reservation.counterpart_contact.clone()));
    if let Some(notes) = reservation.notes.as_ref().filter(|n| !n.trim().is_empty()) {
        body_fields.push(("Notes".to_string(), notes.clone()));
    }

    Notification {
        to,
        subject: format!("Booking Confirmed - {dates}"),
        body_fields,
    }
}

/// Tells a member someone wrote to them.
pub fn message_notification(message: &Message, sender_name: &str, to: String) -> Notification {
    Notification {
        to,
        subject: format!("New Message from {sender_name}"),
        body_fields: vec![
            ("From".to_string(), sender_name.to_string()),
            ("Message".to_string(), message.body.clone()),
            ("Message ID".to_string(), message.id.to_string()),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use chrono::{NaiveTime, Utc};
    use ulid::Ulid;

    fn reservation(start: &str, end: &str) -> Reservation {
        let now = Utc::now();
        Reservation {
            id: Ulid::new(),
            owner_id: None,
            start_date: start.parse().unwrap(),
            end_date: end.parse().unwrap(),
            start_time: None,
            end_time: None,
            category: Category::ReferredGuest,
            counterpart_name: "Ben".into(),
            counterpart_contact: "ben@example.com".into(),
            amount: 100,
            nights: 2,
            status: Status::Confirmed,
            notes: None,
            quota_nights: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn confirmation_subject_and_fields() {
        let r = reservation("2025-08-01", "2025-08-03");
        let n = booking_confirmation(&r, "ava@example.com".into());
        assert_eq!(n.subject, "Booking Confirmed - 2025-08-01 to 2025-08-03");
        assert!(n.body_fields.contains(&("Type".into(), "Friends & Family".into())));
        assert!(n.body_fields.contains(&("Amount".into(), "$100".into())));
        assert!(!n.body_fields.iter().any(|(k, _)| k == "Time"));
    }

    #[test]
    fn same_day_confirmation_has_time() {
        let mut r = reservation("2025-08-30", "2025-08-30");
        r.start_time = NaiveTime::from_hms_opt(10, 0, 0);
        r.end_time = NaiveTime::from_hms_opt(14, 30, 0);
        let n = booking_confirmation(&r, "x@example.com".into());
        assert_eq!(n.subject, "Booking Confirmed - 2025-08-30");
        assert!(n.body_fields.contains(&("Time".into(), "10:00 - 14:30".into())));
    }

    #[test]
    fn recipient_prefers_owner_email() {
        let mut r = reservation("2025-08-01", "2025-08-02");
        assert_eq!(confirmation_recipient(&r, Some("o@example.com")).as_deref(), Some("o@example.com"));
        assert_eq!(confirmation_recipient(&r, None).as_deref(), Some("ben@example.com"));
        r.counterpart_contact = "555-0100".into();
        assert_eq!(confirmation_recipient(&r, Some("  ")), None);
    }

    #[test]
    fn message_notification_names_sender() {
        let message = Message {
            id: Ulid::new(),
            from_owner: Ulid::new(),
            to_owner: Ulid::new(),
            body: "Is the cabin free in May?".into(),
            created_at: Utc::now(),
            read_at: None,
        };
        let n = message_notification(&message, "Ava", "ben@example.com".into());
        assert_eq!(n.to, "ben@example.com");
        assert_eq!(n.subject, "New Message from Ava");
        assert!(n.body_fields.contains(&("Message".into(), "Is the cabin free in May?".into())));
    }

    #[tokio::test]
    async fn log_dispatcher_rejects_blank_recipient() {
        let n = Notification { to: " ".into(), subject: "s".into(), body_fields: vec![] };
        assert_eq!(LogDispatcher.dispatch(n).await, Err(NotifyError::NoRecipient));
    }
}
