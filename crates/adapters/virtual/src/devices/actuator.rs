//! Virtual on/off actuator — accepts `true`, `false` or `"toggle"`.

use std::sync::Mutex;

use datapool_domain::value::Value;

use crate::error::VirtualError;

/// A simulated power channel.
#[derive(Debug)]
pub struct VirtualActuator {
    key: &'static str,
    on: Mutex<bool>,
}

impl VirtualActuator {
    /// A channel called `key`, initially off.
    #[must_use]
    pub fn new(key: &'static str) -> Self {
        Self {
            key,
            on: Mutex::new(false),
        }
    }

    #[must_use]
    pub fn key(&self) -> &'static str {
        self.key
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        *self.lock()
    }

    /// Apply a command and return the resulting power state.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::UnsupportedValue`] for anything other than a
    /// boolean or the string `"toggle"`.
    pub fn apply(&self, command: &Value) -> Result<bool, VirtualError> {
        let mut on = self.lock();
        match command {
            Value::Bool(requested) => *on = *requested,
            Value::String(s) if s == "toggle" => *on = !*on,
            other => {
                return Err(VirtualError::UnsupportedValue {
                    key: self.key.to_string(),
                    value: other.to_string(),
                });
            }
        }
        Ok(*on)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, bool> {
        self.on.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
