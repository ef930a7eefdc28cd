//! Transport port — the endpoint that actually talks to a device.
//!
//! A handler is attached to a datapool instance and may be swapped at any
//! time (e.g. across reconnects) without restarting the pipelines.

use datapool_domain::error::DataPoolError;
use datapool_domain::message::Message;

/// Delivers outbound messages to a device.
pub trait TransportHandler: Send + Sync {
    /// Transmit `message` to the device.
    ///
    /// Called from the instance's send worker; may block on IO. Failures are
    /// logged by the caller and never reported back to the producer.
    ///
    /// # Errors
    ///
    /// Returns [`DataPoolError::Transport`] when the message could not be
    /// transmitted.
    fn send_to_robot(&self, message: &Message) -> Result<(), DataPoolError>;
}
