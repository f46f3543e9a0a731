//! Notification resource: renewal reminders and scan results.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::dispatcher::{DispatchError, Dispatcher};

#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub id: i64,
    /// "upcoming_renewal" | "new_subscription" | "suggestion_available"
    /// | "action_completed" | "action_failed"
    #[serde(rename = "type")]
    pub kind: String,
    pub read: bool,
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct UnreadCount {
    count: u64,
}

pub async fn list(dispatcher: &Dispatcher) -> Result<Vec<Notification>, DispatchError> {
    dispatcher.get("/api/notifications/").await
}

pub async fn unread_count(dispatcher: &Dispatcher) -> Result<u64, DispatchError> {
    let unread: UnreadCount = dispatcher.get("/api/notifications/unread-count").await?;
    Ok(unread.count)
}

pub async fn mark_read(dispatcher: &Dispatcher, id: i64) -> Result<(), DispatchError> {
    dispatcher
        .post_empty(&format!("/api/notifications/{id}/read"))
        .await
}

pub async fn mark_all_read(dispatcher: &Dispatcher) -> Result<(), DispatchError> {
    dispatcher.post_empty("/api/notifications/read-all").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_wire_format() {
        let json = r#"{
            "id": 12,
            "type": "upcoming_renewal",
            "title": "Streamly renews soon",
            "body": "Your Streamly subscription renews on 2026-09-01.",
            "read": false,
            "created_at": "2026-08-02T08:00:00+00:00"
        }"#;

        let notification: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(notification.kind, "upcoming_renewal");
        assert!(!notification.read);
    }
}
