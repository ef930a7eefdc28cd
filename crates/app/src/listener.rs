//! Listener registry — who wants to hear about which channel.
//!
//! Registrations are grouped by `(direction, scope)`. A scope is either one
//! channel key or [`Scope::All`]. A listener registered under both a key and
//! `All` is invoked once per matching scope.
//!
//! Every registration gets a [`ListenerHandle`] so it can be removed without
//! scanning. The registry never owns the lifetime of a listener beyond the
//! `Arc` it was handed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use datapool_domain::error::ListenerError;
use datapool_domain::event::{Direction, Event};

/// Receives events from a datapool instance.
///
/// Invoked on a dispatch worker thread, never on the producer's thread.
pub trait Listener: Send + Sync {
    /// Handle one event.
    ///
    /// # Errors
    ///
    /// Returns a [`ListenerError`] when the listener could not handle the
    /// event. The error is logged by the dispatcher and does not affect the
    /// other listeners of the same event.
    fn on_event(&self, event: &Event) -> Result<(), ListenerError>;
}

impl<F> Listener for F
where
    F: Fn(&Event) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        self(event)
    }
}

/// Wrap an infallible closure as a [`Listener`].
pub fn listener_fn<F>(f: F) -> Arc<dyn Listener>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    Arc::new(move |event: &Event| -> Result<(), ListenerError> {
        f(event);
        Ok(())
    })
}

/// Which channels a registration covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// A single channel key.
    Key(String),
    /// Every channel of the device.
    All,
}

impl Scope {
    #[must_use]
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::All => f.write_str("*"),
        }
    }
}

/// Proof of a registration, used to remove it again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    id: u64,
    direction: Direction,
    scope: Scope,
}

impl ListenerHandle {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

#[derive(Clone)]
struct Registration {
    listener: Arc<dyn Listener>,
    notify_only_when_changed: bool,
}

impl Registration {
    fn wants(&self, event: &Event) -> bool {
        // The change filter only applies to inbound traffic.
        match event.direction {
            Direction::Send => true,
            Direction::Receive => !self.notify_only_when_changed || event.is_change(),
        }
    }
}

type ScopeKey = (Direction, Scope);

/// Concurrent registry of listeners.
///
/// Registration and removal may happen from any thread while dispatch
/// workers read; readers work on a cloned snapshot of the matching lists.
pub struct ListenerRegistry {
    // BTreeMap keyed by the monotonically increasing id keeps registration order.
    scopes: DashMap<ScopeKey, BTreeMap<u64, Registration>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("scopes", &self.scopes.len())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self {
            scopes: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `direction` events in `scope`.
    ///
    /// `notify_only_when_changed` is only consulted for receive events.
    pub fn add(
        &self,
        scope: Scope,
        direction: Direction,
        listener: Arc<dyn Listener>,
        notify_only_when_changed: bool,
    ) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.scopes
            .entry((direction, scope.clone()))
            .or_default()
            .insert(
                id,
                Registration {
                    listener,
                    notify_only_when_changed,
                },
            );

        tracing::trace!(listener_id = id, %direction, %scope, "listener registered");
        ListenerHandle {
            id,
            direction,
            scope,
        }
    }

    /// Remove the registration identified by `handle`.
    ///
    /// Returns `false` if it was already removed.
    pub fn remove(&self, handle: &ListenerHandle) -> bool {
        let key = (handle.direction, handle.scope.clone());
        let mut removed = false;
        self.scopes.remove_if_mut(&key, |_, registrations| {
            removed = registrations.remove(&handle.id).is_some();
            registrations.is_empty()
        });
        if removed {
            tracing::trace!(listener_id = handle.id, "listener unregistered");
        }
        removed
    }

    /// Remove `listener` from every scope and direction it is registered
    /// under, returning the number of registrations dropped.
    pub fn remove_everywhere(&self, listener: &Arc<dyn Listener>) -> usize {
        let target = Arc::as_ptr(listener);
        let mut removed = 0;
        self.scopes.retain(|_, registrations| {
            let before = registrations.len();
            registrations.retain(|_, r| !std::ptr::addr_eq(Arc::as_ptr(&r.listener), target));
            removed += before - registrations.len();
            !registrations.is_empty()
        });
        removed
    }

    /// Listeners to invoke for `event`: the key-specific list first, then the
    /// `All` list, each in registration order.
    #[must_use]
    pub fn listeners_for(&self, event: &Event) -> Vec<Arc<dyn Listener>> {
        let mut matched = Vec::new();
        for scope in [Scope::Key(event.key.clone()), Scope::All] {
            if let Some(registrations) = self.scopes.get(&(event.direction, scope)) {
                matched.extend(
                    registrations
                        .values()
                        .filter(|r| r.wants(event))
                        .map(|r| Arc::clone(&r.listener)),
                );
            }
        }
        matched
    }

    /// Number of registrations for `direction`, across all scopes.
    #[must_use]
    pub fn count(&self, direction: Direction) -> usize {
        self.scopes
            .iter()
            .filter(|entry| entry.key().0 == direction)
            .map(|entry| entry.value().len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datapool_domain::id::DeviceId;
    use datapool_domain::message::Message;
    use std::sync::Mutex;

    fn noop() -> Arc<dyn Listener> {
        listener_fn(|_| {})
    }

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Arc<dyn Listener> {
        let log = Arc::clone(log);
        listener_fn(move |_| log.lock().unwrap().push(name))
    }

    fn invoke_all(registry: &ListenerRegistry, event: &Event) {
        for listener in registry.listeners_for(event) {
            listener.on_event(event).unwrap();
        }
    }

    fn received(key: &str, changed: bool) -> Event {
        Event::received(DeviceId::new(), &Message::new(key, 1_i64), changed)
    }

    #[test]
    fn should_match_key_scope_then_all_scope() {
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.add(Scope::All, Direction::Receive, recording(&log, "all"), false);
        registry.add(Scope::key("K"), Direction::Receive, recording(&log, "k1"), false);
        registry.add(Scope::key("K"), Direction::Receive, recording(&log, "k2"), false);

        invoke_all(&registry, &received("K", true));
        assert_eq!(*log.lock().unwrap(), vec!["k1", "k2", "all"]);
    }

    #[test]
    fn should_not_match_other_keys_or_directions() {
        let registry = ListenerRegistry::new();
        registry.add(Scope::key("K"), Direction::Receive, noop(), false);
        registry.add(Scope::All, Direction::Send, noop(), false);

        assert!(registry.listeners_for(&received("other", true)).is_empty());
    }

    #[test]
    fn should_invoke_listener_once_per_matching_scope() {
        let registry = ListenerRegistry::new();
        let listener = noop();
        registry.add(Scope::key("K"), Direction::Receive, Arc::clone(&listener), false);
        registry.add(Scope::All, Direction::Receive, listener, false);

        assert_eq!(registry.listeners_for(&received("K", true)).len(), 2);
    }

    #[test]
    fn should_skip_change_only_listener_when_value_unchanged() {
        let registry = ListenerRegistry::new();
        registry.add(Scope::key("K"), Direction::Receive, noop(), true);
        registry.add(Scope::key("K"), Direction::Receive, noop(), false);

        assert_eq!(registry.listeners_for(&received("K", false)).len(), 1);
        assert_eq!(registry.listeners_for(&received("K", true)).len(), 2);
    }

    #[test]
    fn should_ignore_change_filter_for_send_events() {
        let registry = ListenerRegistry::new();
        registry.add(Scope::key("K"), Direction::Send, noop(), true);

        let event = Event::sent(DeviceId::new(), &Message::new("K", 1_i64));
        assert_eq!(registry.listeners_for(&event).len(), 1);
    }

    #[test]
    fn should_remove_single_registration_by_handle() {
        let registry = ListenerRegistry::new();
        let listener = noop();
        let keyed = registry.add(Scope::key("K"), Direction::Receive, Arc::clone(&listener), false);
        registry.add(Scope::All, Direction::Receive, listener, false);

        assert!(registry.remove(&keyed));
        assert!(!registry.remove(&keyed));
        assert_eq!(registry.count(Direction::Receive), 1);
    }

    #[test]
    fn should_remove_listener_from_every_scope() {
        let registry = ListenerRegistry::new();
        let listener = noop();
        let other = noop();
        registry.add(Scope::key("K"), Direction::Receive, Arc::clone(&listener), false);
        registry.add(Scope::All, Direction::Send, Arc::clone(&listener), false);
        registry.add(Scope::All, Direction::Send, Arc::clone(&other), false);

        assert_eq!(registry.remove_everywhere(&listener), 2);
        assert_eq!(registry.count(Direction::Receive), 0);
        assert_eq!(registry.count(Direction::Send), 1);
    }

    #[test]
    fn should_hand_out_distinct_handles() {
        let registry = ListenerRegistry::new();
        let a = registry.add(Scope::All, Direction::Send, noop(), false);
        let b = registry.add(Scope::All, Direction::Send, noop(), false);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.scope(), &Scope::All);
        assert_eq!(b.direction(), Direction::Send);
    }
}
