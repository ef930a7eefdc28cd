//! Common error types used across the workspace.
//!
//! Each failure kind is its own typed enum; [`DataPoolError`] aggregates them
//! via `#[from]` so callers can use `?` across layer boundaries.

use crate::id::DeviceId;

/// Top-level error for datapool operations.
#[derive(Debug, thiserror::Error)]
pub enum DataPoolError {
    /// A message or descriptor failed an invariant check.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A queue refused to accept a message.
    #[error("capacity error: {0}")]
    Capacity(#[from] CapacityError),

    /// A device name could not be mapped to an identity.
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// A listener reported a failure while handling an event.
    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),

    /// The transport endpoint failed to deliver a message.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Invariant violations detected before anything is enqueued.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The message key is empty.
    #[error("message key must not be empty")]
    EmptyKey,

    /// The message carries no value.
    #[error("message for key {key:?} has a null value")]
    NullValue { key: String },

    /// A device descriptor has an empty name.
    #[error("device name must not be empty")]
    EmptyName,
}

/// An enqueue was rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CapacityError {
    /// No transport handler is attached to the device.
    #[error("no transport handler attached to device {device}")]
    NoHandler { device: DeviceId },

    /// The underlying queue no longer accepts items.
    #[error("queue of device {device} is closed")]
    QueueClosed { device: DeviceId },

    /// The datapool instance has been stopped.
    #[error("datapool of device {device} is stopped")]
    Stopped { device: DeviceId },
}

/// A device name is unknown to the resolver.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("unknown device {name:?}")]
    UnknownDevice { name: String },
}

/// Failure raised by a listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The listener refused the event.
    #[error("listener rejected the event")]
    Rejected,

    /// The listener failed with an underlying error.
    #[error("listener failed: {0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),
}
