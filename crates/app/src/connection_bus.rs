//! In-process connection lifecycle bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use datapool_domain::connection::ConnectionEvent;

use crate::ports::ConnectionPublisher;

/// In-process connection bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped).
#[derive(Debug, Clone)]
pub struct ConnectionBus {
    sender: broadcast::Sender<ConnectionEvent>,
}

impl ConnectionBus {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to connection events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.sender.subscribe()
    }
}

impl ConnectionPublisher for ConnectionBus {
    fn publish(&self, event: ConnectionEvent) {
        tracing::debug!(device = %event.device_id, state = ?event.state, "connection event");
        // broadcast::send fails only when there are zero receivers.
        let _ = self.sender.send(event);
    }
}
