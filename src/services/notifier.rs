//! In-process fan-out of preview events to live subscribers.
//!
//! Delivery is best-effort: an emit with nobody listening is dropped and
//! slow subscribers may lag behind the channel capacity.

use crate::models::preview::Preview;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Warning,
}

/// Wire shape of everything pushed to clients.
#[derive(Serialize, Clone, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PreviewEvent {
    Update {
        preview: Preview,
    },
    Delete {
        id: Uuid,
    },
    Notification {
        message: String,
        notification_type: NotificationKind,
    },
}

impl PreviewEvent {
    /// Name used for the SSE `event:` field.
    pub fn kind(&self) -> &'static str {
        match self {
            PreviewEvent::Update { .. } => "update",
            PreviewEvent::Delete { .. } => "delete",
            PreviewEvent::Notification { .. } => "notification",
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<PreviewEvent>,
}

impl Notifier {
    /// Default capacity of 256 buffered events per subscriber.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn emit(&self, event: PreviewEvent) {
        // Err only means there are no receivers right now.
        let _ = self.tx.send(event);
    }

    pub fn preview_updated(&self, preview: &Preview) {
        self.emit(PreviewEvent::Update {
            preview: preview.clone(),
        });
    }

    pub fn preview_deleted(&self, id: Uuid) {
        self.emit(PreviewEvent::Delete { id });
    }

    pub fn notify(&self, message: impl Into<String>, notification_type: NotificationKind) {
        self.emit(PreviewEvent::Notification {
            message: message.into(),
            notification_type,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PreviewEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn emit_without_subscribers_is_noop() {
        let notifier = Notifier::new();
        notifier.notify("nobody listening", NotificationKind::Info);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn every_subscriber_receives_events() {
        let notifier = Notifier::new();
        let mut rx1 = notifier.subscribe();
        let mut rx2 = notifier.subscribe();

        let id = Uuid::new_v4();
        notifier.preview_deleted(id);

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                PreviewEvent::Delete { id: got } => assert_eq!(got, id),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let id = Uuid::new_v4();
        let delete = serde_json::to_value(PreviewEvent::Delete { id }).unwrap();
        assert_eq!(delete, json!({"type": "delete", "id": id}));

        let notification = serde_json::to_value(PreviewEvent::Notification {
            message: "Retrying... attempt 1/3".into(),
            notification_type: NotificationKind::Warning,
        })
        .unwrap();
        assert_eq!(
            notification,
            json!({
                "type": "notification",
                "message": "Retrying... attempt 1/3",
                "notification_type": "warning"
            })
        );

        let preview = Preview::new("https://example.com");
        let update = serde_json::to_value(PreviewEvent::Update {
            preview: preview.clone(),
        })
        .unwrap();
        assert_eq!(update["type"], "update");
        assert_eq!(update["preview"]["url"], "https://example.com");
        assert_eq!(update["preview"]["status"], "pending");
    }
}
