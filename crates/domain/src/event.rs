//! Event — what listeners observe once a message has been handled.
//!
//! A send event is produced after a message was handed to the transport; a
//! receive event after an inbound message was written to the current-value
//! store.

use serde::{Deserialize, Serialize};

use crate::id::DeviceId;
use crate::message::Message;
use crate::time::Timestamp;
use crate::value::Value;

/// Traffic direction of a message relative to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Outbound commands, towards the device.
    Send,
    /// Inbound observations, from the device.
    Receive,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Send => f.write_str("send"),
            Self::Receive => f.write_str("receive"),
        }
    }
}

/// An immutable notification derived from a [`Message`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub device_id: DeviceId,
    pub direction: Direction,
    pub timestamp: Timestamp,
    pub key: String,
    pub value: Value,
    /// Whether the value differs from the previously stored one.
    ///
    /// Only present on receive events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
}

impl Event {
    /// Event for a message handed to the transport.
    #[must_use]
    pub fn sent(device_id: DeviceId, message: &Message) -> Self {
        Self {
            device_id,
            direction: Direction::Send,
            timestamp: message.timestamp,
            key: message.key.clone(),
            value: message.value.clone(),
            changed: None,
        }
    }

    /// Event for an inbound message written to the current-value store.
    #[must_use]
    pub fn received(device_id: DeviceId, message: &Message, changed: bool) -> Self {
        Self {
            device_id,
            direction: Direction::Receive,
            timestamp: message.timestamp,
            key: message.key.clone(),
            value: message.value.clone(),
            changed: Some(changed),
        }
    }

    /// `true` unless this is a receive event whose value did not change.
    #[must_use]
    pub fn is_change(&self) -> bool {
        self.changed.unwrap_or(true)
    }
}
