//! Registry — one datapool instance per device identity.
//!
//! Owned by the application's composition root and passed by reference to
//! every consumer. It also owns the dispatch executor shared by all of its
//! instances, and shuts it down in [`DataPoolRegistry::stop_all`].

use std::sync::Arc;

use dashmap::DashMap;
use datapool_domain::connection::{ConnectionEvent, ConnectionState};
use datapool_domain::error::ResolutionError;
use datapool_domain::id::DeviceId;
use tokio::sync::broadcast;

use crate::config::PipelineConfig;
use crate::datapool::DataPool;
use crate::executor::TaskExecutor;
use crate::ports::DeviceResolver;

/// Lifecycle owner of every [`DataPool`].
pub struct DataPoolRegistry<R> {
    resolver: R,
    executor: Arc<dyn TaskExecutor>,
    config: PipelineConfig,
    pools: DashMap<DeviceId, Arc<DataPool>>,
}

impl<R> std::fmt::Debug for DataPoolRegistry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataPoolRegistry")
            .field("pools", &self.pools.len())
            .field("config", &self.config)
            .field("executor_shutdown", &self.executor.is_shutdown())
            .finish_non_exhaustive()
    }
}

impl<R: DeviceResolver> DataPoolRegistry<R> {
    /// Create an empty registry.
    pub fn new(resolver: R, executor: Arc<dyn TaskExecutor>, config: PipelineConfig) -> Self {
        Self {
            resolver,
            executor,
            config,
            pools: DashMap::new(),
        }
    }

    #[must_use]
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// The instance for `device_id`, created on first use.
    ///
    /// Returns the same instance until it is stopped; a stopped instance is
    /// replaced by a fresh one.
    pub fn get(&self, device_id: DeviceId) -> Arc<DataPool> {
        let mut entry = self
            .pools
            .entry(device_id)
            .or_insert_with(|| self.spawn(device_id));
        if entry.is_stopped() {
            *entry = self.spawn(device_id);
        }
        Arc::clone(entry.value())
    }

    /// The instance for the device called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::UnknownDevice`] if the resolver does not
    /// know `name`.
    #[tracing::instrument(skip(self))]
    pub fn get_by_name(&self, name: &str) -> Result<Arc<DataPool>, ResolutionError> {
        let device_id = self.resolver.resolve(name)?;
        Ok(self.get(device_id))
    }

    /// Create an instance for every device the resolver knows.
    #[tracing::instrument(skip(self))]
    pub fn start_all(&self) {
        let devices = self.resolver.known_devices();
        for device in &devices {
            self.get(device.id);
        }
        tracing::info!(count = devices.len(), "datapools started");
    }

    /// Stop every instance, empty the registry and shut the dispatch
    /// executor down. Tasks already queued on the executor still run.
    #[tracing::instrument(skip(self))]
    pub fn stop_all(&self) {
        let pools: Vec<Arc<DataPool>> = self
            .pools
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.pools.clear();
        for pool in &pools {
            pool.stop();
        }
        self.executor.shutdown();
        tracing::info!(count = pools.len(), "datapools stopped");
    }

    /// Apply a connection lifecycle event: a lost link resets the device's
    /// instance. Devices without an instance are ignored.
    pub fn handle_connection_event(&self, event: &ConnectionEvent) {
        match event.state {
            ConnectionState::Lost => {
                let pool = self.pools.get(&event.device_id).map(|e| Arc::clone(e.value()));
                match pool {
                    Some(pool) => pool.reset(),
                    None => tracing::debug!(device = %event.device_id, "connection lost for unknown device"),
                }
            }
            ConnectionState::Established => {
                tracing::debug!(device = %event.device_id, "connection established");
            }
        }
    }

    /// Apply every event from `events` until the bus closes.
    pub async fn watch_connections(&self, mut events: broadcast::Receiver<ConnectionEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.handle_connection_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "connection watcher lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("connection watcher finished");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Identities of every live instance.
    #[must_use]
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.pools.iter().map(|entry| *entry.key()).collect()
    }

    fn spawn(&self, device_id: DeviceId) -> Arc<DataPool> {
        Arc::new(DataPool::spawn(
            device_id,
            Arc::clone(&self.executor),
            self.config.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use datapool_domain::event::{Direction, Event};
    use datapool_domain::message::Message;
    use datapool_domain::value::Value;

    use super::*;
    use crate::connection_bus::ConnectionBus;
    use crate::device_directory::DeviceDirectory;
    use crate::executor::{CallerRunsExecutor, ThreadPoolExecutor};
    use crate::listener::{Scope, listener_fn};
    use crate::ports::ConnectionPublisher;

    fn registry(names: &[&str]) -> DataPoolRegistry<DeviceDirectory> {
        DataPoolRegistry::new(
            DeviceDirectory::from_names(names.iter().copied()).unwrap(),
            Arc::new(ThreadPoolExecutor::default()),
            PipelineConfig {
                poll_interval: Duration::from_millis(1),
            },
        )
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    #[test]
    fn should_return_identical_instance_when_looked_up_twice() {
        let registry = registry(&["DeviceA"]);
        let first = registry.get_by_name("DeviceA").unwrap();
        let second = registry.get_by_name("DeviceA").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn should_fail_resolution_when_name_unknown() {
        let registry = registry(&["DeviceA"]);
        let err = registry.get_by_name("Nope").unwrap_err();
        assert_eq!(
            err,
            ResolutionError::UnknownDevice {
                name: "Nope".to_string()
            }
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn should_create_instance_for_every_known_device_when_started() {
        let registry = registry(&["DeviceA", "DeviceB"]);
        registry.start_all();

        let mut ids = registry.device_ids();
        ids.sort();
        let mut known: Vec<_> = registry
            .resolver()
            .known_devices()
            .into_iter()
            .map(|d| d.id)
            .collect();
        known.sort();
        assert_eq!(ids, known);
    }

    #[test]
    fn should_be_empty_and_create_new_instance_after_stop_all() {
        let registry = registry(&["DeviceA"]);
        let before = registry.get_by_name("DeviceA").unwrap();

        registry.stop_all();
        assert!(registry.is_empty());
        assert!(before.is_stopped());
        assert!(wait_until(|| before.is_terminated()));

        let after = registry.get_by_name("DeviceA").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(!after.is_stopped());
    }

    #[test]
    fn should_replace_instance_when_stopped_individually() {
        let registry = registry(&["DeviceA"]);
        let first = registry.get_by_name("DeviceA").unwrap();
        first.stop();

        let second = registry.get_by_name("DeviceA").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn should_reject_dispatch_after_stop_all() {
        let registry = DataPoolRegistry::new(
            DeviceDirectory::from_names(["DeviceA"]).unwrap(),
            Arc::new(CallerRunsExecutor::default()),
            PipelineConfig::default(),
        );
        registry.stop_all();

        let pool = registry.get_by_name("DeviceA").unwrap();
        let (tx, rx) = mpsc::channel::<Event>();
        let tx = Mutex::new(tx);
        pool.add_listener(
            Scope::All,
            Direction::Receive,
            listener_fn(move |event| {
                let _ = tx.lock().unwrap().send(event.clone());
            }),
            false,
        );

        assert!(pool.receive_to_datapool(Message::new("K", 1_i64)));
        assert!(wait_until(|| pool.get_value("K").is_some()));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn should_reset_instance_when_connection_lost() {
        let registry = registry(&["DeviceA"]);
        let pool = registry.get_by_name("DeviceA").unwrap();
        pool.receive_to_datapool(Message::new("K", "stale"));
        assert!(wait_until(|| pool.get_value("K").is_some()));

        registry.handle_connection_event(&ConnectionEvent::established(pool.device_id()));
        assert_eq!(pool.get_value("K"), Some(Value::from("stale")));

        registry.handle_connection_event(&ConnectionEvent::lost(pool.device_id()));
        assert!(pool.get_value("K").is_none());
        assert!(!pool.is_stopped());
    }

    #[test]
    fn should_ignore_lost_connection_for_device_without_instance() {
        let registry = registry(&["DeviceA"]);
        registry.handle_connection_event(&ConnectionEvent::lost(DeviceId::new()));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn should_reset_from_bus_until_closed() {
        let registry = Arc::new(registry(&["DeviceA"]));
        let pool = registry.get_by_name("DeviceA").unwrap();
        pool.receive_to_datapool(Message::new("K", 1_i64));
        assert!(wait_until(|| pool.get_value("K").is_some()));

        let bus = ConnectionBus::new(16);
        let watcher = {
            let registry = Arc::clone(&registry);
            let events = bus.subscribe();
            tokio::spawn(async move { registry.watch_connections(events).await })
        };

        bus.publish(ConnectionEvent::lost(pool.device_id()));
        drop(bus);
        watcher.await.unwrap();

        assert!(pool.get_value("K").is_none());
    }
}
