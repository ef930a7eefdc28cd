//! Listener dispatch — hands each event to the shared executor.
//!
//! One event becomes one task. Inside that task the matching listeners run
//! one after the other (key scope first, then `All`, each in registration
//! order). Different tasks may run concurrently and out of submission order.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use datapool_domain::event::Event;

use crate::executor::TaskExecutor;
use crate::listener::{Listener, ListenerRegistry};

/// Per-instance dispatcher over a shared executor.
pub struct Dispatcher {
    listeners: Arc<ListenerRegistry>,
    executor: Arc<dyn TaskExecutor>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.listeners)
            .field("executor_shutdown", &self.executor.is_shutdown())
            .finish()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            listeners: Arc::new(ListenerRegistry::new()),
            executor,
        }
    }

    #[must_use]
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Submit `event` to the matching listeners.
    ///
    /// The set of listeners is captured now; registrations made after this
    /// call do not see the event. Returns `false` if the executor refused
    /// the task.
    pub fn dispatch(&self, event: Event) -> bool {
        let matched = self.listeners.listeners_for(&event);
        if matched.is_empty() {
            return true;
        }

        let device = event.device_id;
        let key = event.key.clone();
        match self
            .executor
            .execute(Box::new(move || notify(&event, &matched)))
        {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%device, %key, error = %err, "event dropped, dispatch unavailable");
                false
            }
        }
    }
}

/// Invoke every listener, isolating failures so one listener cannot keep the
/// event from the rest.
fn notify(event: &Event, listeners: &[Arc<dyn Listener>]) {
    for listener in listeners {
        match catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(
                device = %event.device_id,
                key = %event.key,
                direction = %event.direction,
                error = %err,
                "listener failed"
            ),
            Err(_) => tracing::error!(
                device = %event.device_id,
                key = %event.key,
                direction = %event.direction,
                "listener panicked"
            ),
        }
    }
}
