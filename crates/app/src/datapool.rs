//! A per-device datapool instance.
//!
//! Owns the device's send queue, coalescing inbound queue, current-value
//! store and listener registry, plus the two pipeline workers that move
//! messages between them. Listener dispatch goes through an executor shared
//! with every other instance of the same registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use datapool_domain::error::{CapacityError, DataPoolError};
use datapool_domain::event::Direction;
use datapool_domain::id::DeviceId;
use datapool_domain::message::Message;
use datapool_domain::value::Value;
use parking_lot::{Mutex, RwLock};

use crate::coalescing_queue::CoalescingQueue;
use crate::config::PipelineConfig;
use crate::dispatcher::Dispatcher;
use crate::executor::TaskExecutor;
use crate::listener::{Listener, ListenerHandle, Scope};
use crate::pipeline;
use crate::ports::TransportHandler;
use crate::value_store::CurrentValueStore;

/// State shared between the instance and its pipeline workers.
pub(crate) struct Shared {
    pub(crate) device_id: DeviceId,
    pub(crate) config: PipelineConfig,
    outbound_tx: Sender<Message>,
    pub(crate) outbound: Receiver<Message>,
    // Head of the send queue, taken while no handler was attached.
    pub(crate) parked: Mutex<Option<Message>>,
    pub(crate) inbound: CoalescingQueue,
    pub(crate) store: CurrentValueStore,
    pub(crate) dispatcher: Dispatcher,
    handler: RwLock<Option<Arc<dyn TransportHandler>>>,
    // Producers and the receive worker hold it shared; reset holds it exclusively.
    pub(crate) reset_lock: RwLock<()>,
    stopped: AtomicBool,
}

impl Shared {
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn handler(&self) -> Option<Arc<dyn TransportHandler>> {
        self.handler.read().clone()
    }
}

/// One device's data-distribution instance.
///
/// Created through [`DataPoolRegistry::get`](crate::registry::DataPoolRegistry::get).
/// Stopping is terminal: a stopped instance rejects producers and is never
/// restarted.
pub struct DataPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for DataPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataPool")
            .field("device_id", &self.shared.device_id)
            .field("stopped", &self.is_stopped())
            .field("pending_sends", &self.pending_sends())
            .field("pending_receives", &self.pending_receives())
            .field("values", &self.shared.store.len())
            .finish_non_exhaustive()
    }
}

impl DataPool {
    /// Create the instance for `device_id` and start its pipeline workers.
    ///
    /// If a worker thread cannot be spawned the failure is logged and the
    /// instance comes back already stopped.
    #[must_use]
    pub fn spawn(
        device_id: DeviceId,
        executor: Arc<dyn TaskExecutor>,
        config: PipelineConfig,
    ) -> Self {
        let (outbound_tx, outbound) = unbounded();
        let shared = Arc::new(Shared {
            device_id,
            config,
            outbound_tx,
            outbound,
            parked: Mutex::new(None),
            inbound: CoalescingQueue::new(),
            store: CurrentValueStore::new(),
            dispatcher: Dispatcher::new(executor),
            handler: RwLock::new(None),
            reset_lock: RwLock::new(()),
            stopped: AtomicBool::new(false),
        });

        let mut workers = Vec::with_capacity(2);
        for direction in [Direction::Send, Direction::Receive] {
            match pipeline::spawn(direction, Arc::clone(&shared)) {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    tracing::error!(device = %device_id, %direction, error = %err, "failed to spawn pipeline worker");
                    shared.stopped.store(true, Ordering::Release);
                }
            }
        }

        tracing::debug!(device = %device_id, "datapool started");
        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.shared.device_id
    }

    /// Last value received for `key`, if any.
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.shared.store.get(key)
    }

    /// Copy of every current value.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.shared.store.snapshot()
    }

    /// Queue `message` for the attached transport handler.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::Stopped`] after [`stop`](Self::stop),
    /// [`CapacityError::NoHandler`] when no handler is attached, and
    /// [`CapacityError::QueueClosed`] if the send queue refused the message.
    pub fn try_send_to_robot(&self, message: Message) -> Result<(), DataPoolError> {
        let device = self.shared.device_id;
        if self.is_stopped() {
            return Err(CapacityError::Stopped { device }.into());
        }
        if self.shared.handler.read().is_none() {
            return Err(CapacityError::NoHandler { device }.into());
        }

        let _reset = self.shared.reset_lock.read();
        self.shared
            .outbound_tx
            .send(message)
            .map_err(|_| CapacityError::QueueClosed { device })?;
        Ok(())
    }

    /// Boolean form of [`try_send_to_robot`](Self::try_send_to_robot); a
    /// rejection is logged.
    pub fn send_to_robot(&self, message: Message) -> bool {
        let key = message.key.clone();
        match self.try_send_to_robot(message) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(device = %self.shared.device_id, %key, error = %err, "outbound message rejected");
                false
            }
        }
    }

    /// Queue an observation coming from the device.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::Stopped`] after [`stop`](Self::stop), a
    /// [`ValidationError`](datapool_domain::error::ValidationError) for an
    /// empty key or a null value, and [`CapacityError::QueueClosed`] if the
    /// queue refused the message.
    pub fn try_receive_to_datapool(&self, message: Message) -> Result<(), DataPoolError> {
        let device = self.shared.device_id;
        if self.is_stopped() {
            return Err(CapacityError::Stopped { device }.into());
        }
        message.validate()?;

        let _reset = self.shared.reset_lock.read();
        if !self.shared.inbound.add(message) {
            return Err(CapacityError::QueueClosed { device }.into());
        }
        Ok(())
    }

    /// Boolean form of [`try_receive_to_datapool`](Self::try_receive_to_datapool);
    /// a rejection is logged.
    pub fn receive_to_datapool(&self, message: Message) -> bool {
        let key = message.key.clone();
        match self.try_receive_to_datapool(message) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(device = %self.shared.device_id, %key, error = %err, "inbound message rejected");
                false
            }
        }
    }

    pub fn add_listener(
        &self,
        scope: Scope,
        direction: Direction,
        listener: Arc<dyn Listener>,
        notify_only_when_changed: bool,
    ) -> ListenerHandle {
        self.shared
            .dispatcher
            .listeners()
            .add(scope, direction, listener, notify_only_when_changed)
    }

    pub fn remove_listener(&self, handle: &ListenerHandle) -> bool {
        self.shared.dispatcher.listeners().remove(handle)
    }

    /// Remove `listener` from every scope and direction. Returns how many
    /// registrations were dropped.
    pub fn remove_listener_everywhere(&self, listener: &Arc<dyn Listener>) -> usize {
        self.shared.dispatcher.listeners().remove_everywhere(listener)
    }

    #[must_use]
    pub fn listener_count(&self, direction: Direction) -> usize {
        self.shared.dispatcher.listeners().count(direction)
    }

    #[must_use]
    pub fn handler(&self) -> Option<Arc<dyn TransportHandler>> {
        self.shared.handler()
    }

    /// Attach, replace, or detach (`None`) the transport handler. Returns the
    /// previous one. The pipelines keep running across the swap.
    pub fn set_handler(
        &self,
        handler: Option<Arc<dyn TransportHandler>>,
    ) -> Option<Arc<dyn TransportHandler>> {
        tracing::debug!(device = %self.shared.device_id, attached = handler.is_some(), "transport handler set");
        std::mem::replace(&mut *self.shared.handler.write(), handler)
    }

    /// Drop all pending traffic and every current value.
    ///
    /// Used when the device connection is lost. The instance keeps running;
    /// nothing queued before the reset is delivered after it.
    pub fn reset(&self) {
        let _reset = self.shared.reset_lock.write();
        let parked = usize::from(self.shared.parked.lock().take().is_some());
        let discarded_sends = parked + self.shared.outbound.try_iter().count();
        let discarded_receives = self.shared.inbound.size();
        self.shared.inbound.clear();
        self.shared.store.clear();
        tracing::info!(
            device = %self.shared.device_id,
            discarded_sends,
            discarded_receives,
            "datapool reset"
        );
    }

    /// Signal both pipeline workers to exit.
    ///
    /// Cooperative: a transport call in flight completes first. The shared
    /// executor is not touched.
    pub fn stop(&self) {
        if !self.shared.stopped.swap(true, Ordering::AcqRel) {
            tracing::info!(device = %self.shared.device_id, "datapool stopped");
        }
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    /// `true` once stopped and both workers have exited.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.is_stopped() && self.workers.lock().iter().all(JoinHandle::is_finished)
    }

    /// Messages waiting in the send queue.
    #[must_use]
    pub fn pending_sends(&self) -> usize {
        usize::from(self.shared.parked.lock().is_some()) + self.shared.outbound.len()
    }

    /// Messages waiting in the coalescing queue.
    #[must_use]
    pub fn pending_receives(&self) -> usize {
        self.shared.inbound.size()
    }
}

impl Drop for DataPool {
    fn drop(&mut self) {
        self.stop();
    }
}
