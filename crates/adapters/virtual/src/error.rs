//! Virtual adapter error types.

use datapool_domain::error::DataPoolError;

/// Errors raised by the simulated robot.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VirtualError {
    /// The robot has no channel with this key.
    #[error("virtual robot has no channel {key:?}")]
    UnknownChannel { key: String },

    /// The channel exists but cannot take this value.
    #[error("channel {key:?} cannot take value {value}")]
    UnsupportedValue { key: String, value: String },

    /// The datapool the robot reports to is gone.
    #[error("virtual robot is detached from its datapool")]
    Detached,
}

impl From<VirtualError> for DataPoolError {
    fn from(err: VirtualError) -> Self {
        Self::Transport(Box::new(err))
    }
}
