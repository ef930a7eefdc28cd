//! # datapoold — datapool daemon
//!
//! Composition root that wires the registry, the virtual robots and logging
//! together and runs until interrupted.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Initialise the `tracing` subscriber
//! - Build the device directory, the dispatch pool and the registry
//! - Start one datapool per configured device
//! - Attach a virtual robot and sensor to every device when enabled
//! - Reset datapools on connection loss
//! - Handle graceful shutdown (Ctrl-C), letting queued listener callbacks
//!   drain for a bounded time
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no data-distribution logic belongs here.

mod config;

use std::sync::Arc;

use datapool_adapter_virtual::{VirtualRobot, VirtualSensor};
use datapool_app::connection_bus::ConnectionBus;
use datapool_app::device_directory::DeviceDirectory;
use datapool_app::executor::ThreadPoolExecutor;
use datapool_app::listener::{Scope, listener_fn};
use datapool_app::ports::DeviceResolver;
use datapool_app::registry::DataPoolRegistry;
use datapool_domain::event::Direction;
use datapool_domain::time;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Registry
    let directory = DeviceDirectory::from_names(config.device_names())?;
    if directory.is_empty() {
        tracing::warn!("no devices configured, add [[devices]] entries to datapool.toml");
    }
    let executor = ThreadPoolExecutor::new(config.executor_config());
    let registry = Arc::new(DataPoolRegistry::new(
        directory,
        Arc::new(executor.clone()),
        config.pipeline_config(),
    ));
    registry.start_all();

    // Connection lifecycle
    let bus = ConnectionBus::new(64);
    let watcher = {
        let registry = Arc::clone(&registry);
        let events = bus.subscribe();
        tokio::spawn(async move { registry.watch_connections(events).await })
    };

    // Devices
    let logger = listener_fn(|event| {
        tracing::info!(
            device = %event.device_id,
            direction = %event.direction,
            key = %event.key,
            value = %event.value,
            changed = ?event.changed,
            at_ms = time::as_millis(event.timestamp),
            "event"
        );
    });
    let mut sensors = Vec::new();
    for device in registry.resolver().known_devices() {
        let pool = registry.get(device.id);
        pool.add_listener(Scope::All, Direction::Send, Arc::clone(&logger), false);
        pool.add_listener(Scope::All, Direction::Receive, Arc::clone(&logger), true);

        if config.virtual_robot.enabled {
            VirtualRobot::attach(&pool, bus.clone());
            sensors.push(VirtualSensor::start(&pool, config.sensor_period())?);
        }
        tracing::info!(device = %device.id, name = %device.name, "device ready");
    }

    tracing::info!(devices = registry.len(), "datapoold running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down");
    for sensor in &mut sensors {
        sensor.stop();
    }
    registry.stop_all();
    watcher.abort();

    let grace = config.shutdown_timeout();
    let drained = tokio::task::spawn_blocking(move || executor.await_termination(grace)).await?;
    if !drained {
        tracing::warn!(
            timeout_ms = config.dispatch.shutdown_timeout_ms,
            "dispatch pool still busy at shutdown, pending listener callbacks abandoned"
        );
    }
    Ok(())
}
