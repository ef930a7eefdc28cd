//! Connection lifecycle notifications emitted by the transport layer.

use serde::{Deserialize, Serialize};

use crate::id::DeviceId;

/// Link state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Established,
    Lost,
}

/// A device's link went up or down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub device_id: DeviceId,
    pub state: ConnectionState,
}

impl ConnectionEvent {
    #[must_use]
    pub fn established(device_id: DeviceId) -> Self {
        Self {
            device_id,
            state: ConnectionState::Established,
        }
    }

    #[must_use]
    pub fn lost(device_id: DeviceId) -> Self {
        Self {
            device_id,
            state: ConnectionState::Lost,
        }
    }
}
