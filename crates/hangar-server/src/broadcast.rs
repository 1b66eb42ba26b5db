use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use hangar_core::events::{Envelope, HubEvent};
use hangar_core::ids::SessionId;

use crate::subscribers::{ClientId, SubscriberRegistry};

/// Fans a structured event out to every live subscriber of a session.
///
/// Publish is fire-and-forget with respect to individual subscriber health:
/// a connection that cannot accept the frame is treated as dead and pruned,
/// and the failure never reaches the publisher. A session with no
/// subscribers is a no-op.
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self { registry }
    }

    pub fn publish<T: Serialize>(&self, session_id: &SessionId, event: HubEvent, data: &T) {
        let data = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(session_id = %session_id, event = %event, %err, "event payload failed to serialize");
                return;
            }
        };
        self.publish_value(session_id, event, data);
    }

    fn publish_value(&self, session_id: &SessionId, event: HubEvent, data: serde_json::Value) {
        // Snapshot under the lock, deliver outside it.
        let connections = self.registry.snapshot(session_id);
        if connections.is_empty() {
            return;
        }

        // Serialized once per publish, not once per recipient.
        let envelope = Envelope::new(event, session_id.clone(), data);
        let message = match serde_json::to_string(&envelope) {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(session_id = %session_id, event = %event, %err, "event envelope failed to serialize");
                return;
            }
        };

        let mut dead: Vec<ClientId> = Vec::new();
        for (client_id, tx) in &connections {
            if tx.try_send(message.clone()).is_err() {
                tracing::warn!(
                    session_id = %session_id,
                    client_id = %client_id,
                    event = %event,
                    "delivery failed, pruning subscriber"
                );
                dead.push(client_id.clone());
            }
        }

        self.registry.prune(session_id, &dead);
    }

    /// Emit an `error.occurred` event with a human-readable message and a
    /// source tag.
    pub fn publish_error(&self, session_id: &SessionId, message: &str, source: &str) {
        self.publish(
            session_id,
            HubEvent::ErrorOccurred,
            &json!({ "message": message, "source": source }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Broadcaster, Arc<SubscriberRegistry>, SessionId) {
        let registry = Arc::new(SubscriberRegistry::new(32));
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        (broadcaster, registry, SessionId::new())
    }

    #[tokio::test]
    async fn publish_reaches_all_session_subscribers() {
        let (broadcaster, registry, session) = setup();
        let (_id1, mut rx1) = registry.subscribe(&session);
        let (_id2, mut rx2) = registry.subscribe(&session);

        broadcaster.publish(&session, HubEvent::NoteCreated, &json!({"content": "motor start"}));

        let msg1 = rx1.try_recv().unwrap();
        let msg2 = rx2.try_recv().unwrap();
        assert_eq!(msg1, msg2);
        assert!(msg1.contains("\"event\":\"note.created\""));
    }

    #[tokio::test]
    async fn publish_skips_other_sessions() {
        let (broadcaster, registry, session) = setup();
        let other = SessionId::new();
        let (_id, mut other_rx) = registry.subscribe(&other);

        broadcaster.publish(&session, HubEvent::NoteCreated, &json!({}));

        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_to_empty_session_is_noop() {
        let (broadcaster, registry, session) = setup();

        broadcaster.publish(&session, HubEvent::NoteCreated, &json!({}));

        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test]
    async fn dead_subscriber_is_pruned_at_publish_time() {
        let (broadcaster, registry, session) = setup();
        let (_live_id, mut live_rx) = registry.subscribe(&session);
        let (_dead_id, dead_rx) = registry.subscribe(&session);
        drop(dead_rx);

        broadcaster.publish(&session, HubEvent::NoteUpdated, &json!({}));

        // The live subscriber still got the event; the dead one is gone.
        assert!(live_rx.try_recv().is_ok());
        assert_eq!(registry.connection_count(&session), 1);

        // A second publish never attempts the pruned connection again.
        broadcaster.publish(&session, HubEvent::NoteUpdated, &json!({}));
        assert!(live_rx.try_recv().is_ok());
        assert_eq!(registry.connection_count(&session), 1);
    }

    #[tokio::test]
    async fn pruning_last_subscriber_drops_session_entry() {
        let (broadcaster, registry, session) = setup();
        let (_id, rx) = registry.subscribe(&session);
        drop(rx);

        broadcaster.publish(&session, HubEvent::NoteDeleted, &json!({}));

        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test]
    async fn full_queue_counts_as_dead() {
        let registry = Arc::new(SubscriberRegistry::new(1));
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let session = SessionId::new();
        let (_id, _rx) = registry.subscribe(&session);

        broadcaster.publish(&session, HubEvent::NoteCreated, &json!({"n": 1}));
        broadcaster.publish(&session, HubEvent::NoteCreated, &json!({"n": 2}));

        assert_eq!(registry.connection_count(&session), 0);
    }

    #[tokio::test]
    async fn error_event_carries_message_and_source() {
        let (broadcaster, registry, session) = setup();
        let (_id, mut rx) = registry.subscribe(&session);

        broadcaster.publish_error(&session, "decode error", "stt");

        let msg = rx.try_recv().unwrap();
        assert!(msg.contains("\"event\":\"error.occurred\""));
        assert!(msg.contains("\"message\":\"decode error\""));
        assert!(msg.contains("\"source\":\"stt\""));
    }

    #[tokio::test]
    async fn task_done_event_carries_transcript() {
        let (broadcaster, registry, session) = setup();
        let (_id, mut rx) = registry.subscribe(&session);

        broadcaster.publish(
            &session,
            HubEvent::SttTaskDone,
            &json!({ "transcript": "hello world" }),
        );

        let msg = rx.try_recv().unwrap();
        assert!(msg.contains("\"event\":\"stt.task.done\""));
        assert!(msg.contains("hello world"));
    }
}
