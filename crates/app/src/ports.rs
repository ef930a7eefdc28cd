//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the data-distribution core and the
//! outside world: the device transport, the connection lifecycle signal and
//! the device-name resolver.

pub mod connection;
pub mod device_resolver;
pub mod transport;

pub use connection::ConnectionPublisher;
pub use device_resolver::DeviceResolver;
pub use transport::TransportHandler;
