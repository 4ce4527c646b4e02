//! Registry of open push channels and best-effort fan-out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifier assigned to a push channel when it connects.
pub type ClientId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Connected,
    FileCreated,
    FileDeleted,
    FileUpdated,
    Error,
}

/// Notification sent over a push channel.
#[derive(Debug, Clone, Serialize)]
pub struct PushEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl PushEvent {
    pub fn new(kind: EventKind, data: Value) -> Self {
        Self {
            kind,
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Handle to the set of connected push channels.
///
/// Clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct PushRegistry {
    clients: Arc<Mutex<HashMap<ClientId, UnboundedSender<PushEvent>>>>,
}

impl PushRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ClientId, UnboundedSender<PushEvent>>> {
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a channel. Its first event is the `connected` acknowledgment.
    pub fn register(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::unbounded_channel();
        // The receiver is alive, so queuing the ack cannot fail.
        let _ = sender.send(PushEvent::new(
            EventKind::Connected,
            json!({ "clientId": id }),
        ));
        self.lock().insert(id, sender);
        debug!(client = %id, "push channel connected");

        Subscription {
            id,
            receiver,
            registry: self.clone(),
        }
    }

    /// Drop a channel. Removing an unknown or already removed ID is a no-op.
    pub fn remove(&self, id: ClientId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!(client = %id, "push channel removed");
        }
        removed
    }

    /// Number of open channels.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send one event to every open channel and return how many received it.
    ///
    /// A channel whose send fails is evicted; the others are unaffected.
    pub fn broadcast(&self, kind: EventKind, data: Value) -> usize {
        let event = PushEvent::new(kind, data);
        let mut clients = self.lock();

        let failed: Vec<ClientId> = clients
            .iter()
            .filter_map(|(id, sender)| sender.send(event.clone()).err().map(|_| *id))
            .collect();

        for id in &failed {
            clients.remove(id);
            warn!(client = %id, "evicted push channel after failed write");
        }

        let delivered = clients.len();
        debug!(?kind, delivered, "broadcast push event");
        delivered
    }
}

/// Receiving end of a push channel; deregisters itself when dropped.
#[derive(Debug)]
pub struct Subscription {
    id: ClientId,
    receiver: UnboundedReceiver<PushEvent>,
    registry: PushRegistry,
}

impl Subscription {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> Option<PushEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking receive, `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<PushEvent> {
        self.receiver.try_recv().ok()
    }

    /// Turn the subscription into a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = PushEvent> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .map(|event| (event, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
