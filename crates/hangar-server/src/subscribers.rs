use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use hangar_core::ids::SessionId;

/// Unique subscriber connection identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientId(pub String);

impl Default for ClientId {
    fn default() -> Self {
        Self(format!("client_{}", Uuid::now_v7()))
    }
}

impl ClientId {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-session sets of live subscriber connections.
///
/// A connection belongs to exactly one session for its whole lifetime and
/// leaves only through `unsubscribe` or publish-time pruning. Sessions with
/// zero subscribers hold no entry at all.
pub struct SubscriberRegistry {
    sessions: DashMap<SessionId, HashMap<ClientId, mpsc::Sender<String>>>,
    max_send_queue: usize,
}

impl SubscriberRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_send_queue,
        }
    }

    /// Register a new connection under a session. The caller has already
    /// verified the session exists.
    pub fn subscribe(&self, session_id: &SessionId) -> (ClientId, mpsc::Receiver<String>) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        self.sessions
            .entry(session_id.clone())
            .or_default()
            .insert(id.clone(), tx);
        (id, rx)
    }

    pub fn unsubscribe(&self, session_id: &SessionId, client_id: &ClientId) {
        if let Some(mut entry) = self.sessions.get_mut(session_id) {
            entry.remove(client_id);
        }
        self.sessions
            .remove_if(session_id, |_, connections| connections.is_empty());
    }

    /// Consistent view of a session's connections for one broadcast pass.
    pub fn snapshot(&self, session_id: &SessionId) -> Vec<(ClientId, mpsc::Sender<String>)> {
        self.sessions
            .get(session_id)
            .map(|connections| {
                connections
                    .iter()
                    .map(|(id, tx)| (id.clone(), tx.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove connections that failed delivery; drops the session entry if
    /// that empties it.
    pub fn prune(&self, session_id: &SessionId, dead: &[ClientId]) {
        if dead.is_empty() {
            return;
        }
        if let Some(mut entry) = self.sessions.get_mut(session_id) {
            for id in dead {
                entry.remove(id);
            }
        }
        self.sessions
            .remove_if(session_id, |_, connections| connections.is_empty());
    }

    /// Number of sessions with at least one live connection.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn connection_count(&self, session_id: &SessionId) -> usize {
        self.sessions
            .get(session_id)
            .map(|connections| connections.len())
            .unwrap_or(0)
    }
}
