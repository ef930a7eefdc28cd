//! Ordered inbound queue that collapses superseded droppable messages.
//!
//! The queue keeps two structures under a single lock:
//!
//! - `order`: one key per pending message, in enqueue order. A key appears
//!   once per pending message for that key.
//! - `buffer`: per key, the pending messages in FIFO order.
//!
//! `order.len()` always equals the number of messages held in `buffer`.
//!
//! A droppable message for a key that already has a pending droppable copy
//! takes that copy's slot in the key's FIFO instead of claiming a new slot in
//! `order`. The key therefore keeps the delivery priority it got on its
//! first enqueue, at most one droppable copy is ever pending per key, and
//! pending non-droppable messages are never superseded.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use datapool_domain::message::Message;
use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct State {
    order: VecDeque<String>,
    buffer: HashMap<String, VecDeque<Message>>,
}

impl State {
    fn pop(&mut self) -> Option<Message> {
        let key = self.order.pop_front()?;
        let pending = self.buffer.get_mut(&key)?;
        let message = pending.pop_front();
        if pending.is_empty() {
            self.buffer.remove(&key);
        }
        message
    }

    fn head(&self) -> Option<&Message> {
        let key = self.order.front()?;
        self.buffer.get(key)?.front()
    }
}

/// Thread-safe coalescing queue of inbound messages.
#[derive(Debug, Default)]
pub struct CoalescingQueue {
    state: Mutex<State>,
    available: Condvar,
}

impl CoalescingQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message, coalescing it with a pending droppable copy of the
    /// same key when there is one.
    ///
    /// Always returns `true`; the queue is unbounded.
    pub fn add(&self, message: Message) -> bool {
        let mut state = self.state.lock();
        let State { order, buffer } = &mut *state;

        if message.droppable
            && let Some(pending) = buffer.get_mut(&message.key)
            && let Some(stale) = pending.iter().position(|m| m.droppable)
        {
            pending.remove(stale);
            pending.push_back(message);
            drop(state);
            self.available.notify_one();
            return true;
        }

        order.push_back(message.key.clone());
        buffer
            .entry(message.key.clone())
            .or_default()
            .push_back(message);
        drop(state);
        self.available.notify_one();
        true
    }

    /// The message that [`poll`](Self::poll) would return, without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<Message> {
        self.state.lock().head().cloned()
    }

    /// Remove and return the oldest pending message of the head key.
    pub fn poll(&self) -> Option<Message> {
        self.state.lock().pop()
    }

    /// Like [`poll`](Self::poll), but waits up to `timeout` for a message to
    /// arrive when the queue is empty.
    pub fn poll_timeout(&self, timeout: Duration) -> Option<Message> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(message) = state.pop() {
                return Some(message);
            }
            if self.available.wait_until(&mut state, deadline).timed_out() {
                return state.pop();
            }
        }
    }

    /// Number of pending messages.
    #[must_use]
    pub fn size(&self) -> usize {
        self.state.lock().order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().order.is_empty()
    }

    /// Drop every pending message.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.order.clear();
        state.buffer.clear();
    }
}
