//! Connection lifecycle port — link up/down notifications per device.

use datapool_domain::connection::ConnectionEvent;

/// Publishes connection lifecycle events to interested subscribers.
pub trait ConnectionPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: ConnectionEvent);
}

impl<T: ConnectionPublisher + Send + Sync> ConnectionPublisher for std::sync::Arc<T> {
    fn publish(&self, event: ConnectionEvent) {
        (**self).publish(event);
    }
}
