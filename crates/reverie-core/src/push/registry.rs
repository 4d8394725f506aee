//! Registry of live push connections.
//!
//! Each recipient (a user, or the privileged relay) has at most one current
//! connection, represented by a bounded `mpsc` sender feeding that
//! connection's socket writer. A later registration replaces an earlier one.
//! Unregistering only removes the mapping if the caller's connection is still
//! the current one, so a stale disconnect cannot evict a newer registration.
//!
//! Delivery is at-most-once and best effort: events for absent recipients or
//! full queues are dropped. Broadcast events go through a
//! `tokio::sync::broadcast` channel every connection subscribes to.

use dashmap::DashMap;
use reverie_types::config::PushConfig;
use reverie_types::event::{PushEvent, RecipientId};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

/// Identifies one physical connection of a recipient.
pub type ConnectionId = Uuid;

struct PushConnection {
    id: ConnectionId,
    sender: mpsc::Sender<PushEvent>,
}

pub struct PushRegistry {
    connections: DashMap<RecipientId, PushConnection>,
    broadcast: broadcast::Sender<PushEvent>,
    channel_capacity: usize,
}

impl PushRegistry {
    pub fn new(channel_capacity: usize, broadcast_capacity: usize) -> Self {
        let (broadcast, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            connections: DashMap::new(),
            broadcast,
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub fn from_config(config: &PushConfig) -> Self {
        Self::new(config.channel_capacity, config.broadcast_capacity)
    }

    /// Register a new connection for `recipient`, superseding any previous one.
    ///
    /// The returned receiver is the connection's outbound queue.
    pub fn register(&self, recipient: RecipientId) -> (ConnectionId, mpsc::Receiver<PushEvent>) {
        let (sender, receiver) = mpsc::channel(self.channel_capacity);
        let id = Uuid::now_v7();
        if let Some(previous) = self
            .connections
            .insert(recipient, PushConnection { id, sender })
        {
            debug!(%recipient, previous = %previous.id, "push connection superseded");
        }
        debug!(%recipient, connection_id = %id, "push connection registered");
        (id, receiver)
    }

    /// Remove `recipient`'s mapping if `connection_id` is still current.
    ///
    /// Returns `true` if the mapping was removed.
    pub fn unregister(&self, recipient: RecipientId, connection_id: ConnectionId) -> bool {
        let removed = self
            .connections
            .remove_if(&recipient, |_, conn| conn.id == connection_id)
            .is_some();
        debug!(%recipient, %connection_id, removed, "push connection unregistered");
        removed
    }

    /// Deliver `event` to `recipient`'s current connection.
    ///
    /// Returns `false` when the recipient is offline or its queue is full or closed.
    pub fn send_to(&self, recipient: RecipientId, event: PushEvent) -> bool {
        let Some((connection_id, sender)) = self
            .connections
            .get(&recipient)
            .map(|conn| (conn.id, conn.sender.clone()))
        else {
            debug!(%recipient, event = event.name(), "recipient offline, push dropped");
            return false;
        };

        match sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                debug!(%recipient, event = event.name(), "push queue full, event dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(%recipient, event = event.name(), "push connection closed, event dropped");
                self.connections
                    .remove_if(&recipient, |_, conn| conn.id == connection_id);
                false
            }
        }
    }

    /// Send `event` to every subscriber. Returns the number of subscribers reached.
    pub fn broadcast(&self, event: PushEvent) -> usize {
        self.broadcast.send(event).unwrap_or(0)
    }

    /// Subscribe to broadcast events.
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.broadcast.subscribe()
    }

    pub fn is_connected(&self, recipient: RecipientId) -> bool {
        self.connections.contains_key(&recipient)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for PushRegistry {
    fn default() -> Self {
        Self::from_config(&PushConfig::default())
    }
}

impl std::fmt::Debug for PushRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushRegistry")
            .field("connections", &self.connections.len())
            .field("broadcast_receivers", &self.broadcast.receiver_count())
            .finish()
    }
}
