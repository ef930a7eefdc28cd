//! # datapool-app
//!
//! Application layer — the in-process data-distribution core and its
//! **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement:
//!   - `TransportHandler` — delivers outbound messages to a device
//!   - `ConnectionPublisher` — emits link up/down notifications
//!   - `DeviceResolver` — maps device names to identities
//! - Provide the per-device machinery:
//!   - `CoalescingQueue` — ordered inbound queue collapsing droppable values
//!   - `CurrentValueStore` — last value per key
//!   - send/receive pipeline workers and the `DataPool` instance
//!   - `ListenerRegistry` + `Dispatcher` over a shared `TaskExecutor`
//! - Provide `DataPoolRegistry`, the lifecycle owner of every instance
//!
//! ## Dependency rule
//! Depends on `datapool-domain` only (plus `tokio::sync` for the connection
//! bus). Never imports adapter crates. Adapters depend on *this* crate, not
//! the reverse.

pub mod coalescing_queue;
pub mod config;
pub mod connection_bus;
pub mod datapool;
pub mod device_directory;
pub mod dispatcher;
pub mod executor;
pub mod listener;
mod pipeline;
pub mod ports;
pub mod registry;
pub mod value_store;
