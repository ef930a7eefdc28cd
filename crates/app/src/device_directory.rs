//! In-memory [`DeviceResolver`] built from a fixed list of devices.

use std::collections::HashMap;

use datapool_domain::device::Device;
use datapool_domain::error::{ResolutionError, ValidationError};
use datapool_domain::id::DeviceId;

use crate::ports::DeviceResolver;

/// Static name → identity directory.
#[derive(Debug, Default, Clone)]
pub struct DeviceDirectory {
    devices: Vec<Device>,
    by_name: HashMap<String, DeviceId>,
}

impl DeviceDirectory {
    /// Build a directory, assigning a fresh identity to every name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] if a name is blank.
    pub fn from_names<I, S>(names: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut directory = Self::default();
        for name in names {
            directory.insert(Device::builder().name(name).build()?);
        }
        Ok(directory)
    }

    /// Add a device, replacing any previous device with the same name.
    pub fn insert(&mut self, device: Device) {
        if let Some(previous) = self.by_name.insert(device.name.clone(), device.id) {
            self.devices.retain(|d| d.id != previous);
        }
        self.devices.push(device);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl DeviceResolver for DeviceDirectory {
    fn resolve(&self, name: &str) -> Result<DeviceId, ResolutionError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ResolutionError::UnknownDevice {
                name: name.to_string(),
            })
    }

    fn known_devices(&self) -> Vec<Device> {
        self.devices.clone()
    }
}
