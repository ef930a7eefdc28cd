//! Device resolver port — maps human-readable device names to identities.

use datapool_domain::device::Device;
use datapool_domain::error::ResolutionError;
use datapool_domain::id::DeviceId;

/// Resolves device names and enumerates the devices the application knows.
pub trait DeviceResolver: Send + Sync {
    /// Identity of the device called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::UnknownDevice`] when no device has that name.
    fn resolve(&self, name: &str) -> Result<DeviceId, ResolutionError>;

    /// Every device currently known.
    fn known_devices(&self) -> Vec<Device>;
}
