//! Live subscriber connections.
//!
//! A [`SubscriberHandle`] is the hub's side of one outbound connection: a
//! bounded channel whose receiving end is drained into the socket by the
//! connection's writer task. Delivering to a subscriber means getting a
//! payload into that channel within the send timeout. When the writer goes
//! away the channel closes and the next delivery fails.
//!
//! [`SubscriberRegistry`] is a plain set of handles keyed by
//! [`SubscriberId`]. Locking is the owner's job; see
//! [`FireHub`](crate::hub::FireHub).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use firewatch_types::SubscriberId;
use tokio::sync::mpsc;

/// Serialized reading shared by every delivery of one broadcast pass.
pub type Payload = Arc<str>;

/// Why one delivery to one subscriber failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The subscriber's writer has gone away.
    #[error("subscriber connection closed")]
    Closed,

    /// The subscriber's outbound buffer stayed full for the whole timeout.
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Outcome of removing a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The subscriber was registered and has been removed.
    Removed,
    /// The subscriber was not registered. Not an error.
    AlreadyAbsent,
}

/// Handle to one live outbound connection.
#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    id: SubscriberId,
    peer: String,
    tx: mpsc::Sender<Payload>,
}

impl SubscriberHandle {
    /// Create a handle with a fresh identity and the receiving end its
    /// writer task should drain.
    ///
    /// `buffer` is the number of payloads that may queue before delivery
    /// starts waiting; zero is raised to one.
    pub fn channel(peer: impl Into<String>, buffer: usize) -> (Self, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = Self {
            id: SubscriberId::new(),
            peer: peer.into(),
            tx,
        };
        (handle, rx)
    }

    /// Identity of the connection.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remote address or other label used in logs.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Whether the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queue `payload` for this subscriber, waiting at most `timeout` for
    /// buffer space.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::Closed`] if the writer is gone,
    /// [`DeliveryError::Timeout`] if the buffer stayed full.
    pub async fn deliver(&self, payload: Payload, timeout: Duration) -> Result<(), DeliveryError> {
        match tokio::time::timeout(timeout, self.tx.send(payload)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_closed)) => Err(DeliveryError::Closed),
            Err(_elapsed) => Err(DeliveryError::Timeout(timeout)),
        }
    }
}

/// Set of live subscribers.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    members: HashMap<SubscriberId, SubscriberHandle>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Returns `false` if the same identity is already
    /// registered, in which case the registry is unchanged.
    pub fn register(&mut self, handle: SubscriberHandle) -> bool {
        if self.members.contains_key(&handle.id) {
            return false;
        }
        self.members.insert(handle.id, handle);
        true
    }

    /// Remove a subscriber. Removing an absent one is a no-op.
    pub fn unregister(&mut self, id: SubscriberId) -> Removal {
        if self.members.remove(&id).is_some() {
            Removal::Removed
        } else {
            Removal::AlreadyAbsent
        }
    }

    /// Copy of the current members, in no particular order.
    pub fn snapshot(&self) -> Vec<SubscriberHandle> {
        self.members.values().cloned().collect()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.members.contains_key(&id)
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Drop every subscriber, closing their channels. Returns how many
    /// were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.members.len();
        self.members.clear();
        removed
    }
}
