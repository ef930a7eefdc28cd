//! Message — a keyed value on its way to or from a device.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::time::{Timestamp, now};
use crate::value::Value;

/// An immutable keyed value.
///
/// A `droppable` message tells the inbound queue that only the most recent
/// pending value for its key matters; older pending copies may be discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub key: String,
    pub value: Value,
    pub timestamp: Timestamp,
    pub droppable: bool,
}

impl Message {
    /// A message that is always delivered, stamped with the current time.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            timestamp: now(),
            droppable: false,
        }
    }

    /// A message that may be superseded by a newer one for the same key.
    #[must_use]
    pub fn droppable(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            droppable: true,
            ..Self::new(key, value)
        }
    }

    /// Create a builder for constructing a [`Message`].
    #[must_use]
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// Check invariants required for the inbound path.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyKey`] when `key` is empty, or
    /// [`ValidationError::NullValue`] when the value is null.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.key.is_empty() {
            return Err(ValidationError::EmptyKey);
        }
        if self.value.is_null() {
            return Err(ValidationError::NullValue {
                key: self.key.clone(),
            });
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Message`].
#[derive(Debug, Default)]
pub struct MessageBuilder {
    key: Option<String>,
    value: Option<Value>,
    timestamp: Option<Timestamp>,
    droppable: bool,
}

impl MessageBuilder {
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn droppable(mut self, droppable: bool) -> Self {
        self.droppable = droppable;
        self
    }

    /// Consume the builder, validate, and return a [`Message`].
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the key is missing/empty or the value
    /// is missing/null.
    pub fn build(self) -> Result<Message, ValidationError> {
        let message = Message {
            key: self.key.unwrap_or_default(),
            value: self.value.unwrap_or(Value::Null),
            timestamp: self.timestamp.unwrap_or_else(now),
            droppable: self.droppable,
        };
        message.validate()?;
        Ok(message)
    }
}
