//! Send and receive pipeline workers.
//!
//! Each datapool instance runs one dedicated thread per direction. A worker
//! waits at most `poll_interval` for work before re-checking the stop flag,
//! and never exits because a single message failed.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::RecvTimeoutError;
use datapool_domain::event::{Direction, Event};

use crate::datapool::Shared;

/// Spawn the worker for `direction`.
///
/// # Errors
///
/// Returns the OS error if the thread could not be created.
pub(crate) fn spawn(direction: Direction, shared: Arc<Shared>) -> std::io::Result<JoinHandle<()>> {
    let name = match direction {
        Direction::Send => format!("datapool-send-{}", shared.device_id.short()),
        Direction::Receive => format!("datapool-recv-{}", shared.device_id.short()),
    };
    thread::Builder::new().name(name).spawn(move || match direction {
        Direction::Send => run(&shared, direction, send_step),
        Direction::Receive => run(&shared, direction, receive_step),
    })
}

fn run(shared: &Shared, direction: Direction, step: fn(&Shared)) {
    tracing::debug!(device = %shared.device_id, %direction, "pipeline started");
    while !shared.is_stopped() {
        if catch_unwind(AssertUnwindSafe(|| step(shared))).is_err() {
            tracing::error!(
                device = %shared.device_id,
                %direction,
                "pipeline step panicked, continuing"
            );
        }
    }
    tracing::debug!(device = %shared.device_id, %direction, "pipeline stopped");
}

/// Move at most one message from the send queue to the transport.
fn send_step(shared: &Shared) {
    // Nothing leaves the queue while no handler is attached.
    if shared.handler().is_none() {
        thread::sleep(shared.config.poll_interval);
        return;
    }

    let (handler, message) = {
        // Taking a message and parking it must not straddle a reset.
        let _reset = shared.reset_lock.read();
        let parked = shared.parked.lock().take();
        let message = match parked {
            Some(message) => message,
            None => match shared.outbound.recv_timeout(shared.config.poll_interval) {
                Ok(message) => message,
                // The sender lives in `Shared`, so the queue never disconnects.
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return,
            },
        };
        // The handler may have been detached or replaced during the wait.
        let Some(handler) = shared.handler() else {
            *shared.parked.lock() = Some(message);
            return;
        };
        (handler, message)
    };

    if let Err(err) = handler.send_to_robot(&message) {
        tracing::warn!(
            device = %shared.device_id,
            key = %message.key,
            error = %err,
            "transport failed to send message"
        );
    }
    shared.dispatcher.dispatch(Event::sent(shared.device_id, &message));
}

/// Move at most one message from the coalescing queue into the store.
fn receive_step(shared: &Shared) {
    let event = {
        // Poll and store update must not straddle a reset.
        let _reset = shared.reset_lock.read();
        let Some(message) = shared.inbound.poll_timeout(shared.config.poll_interval) else {
            return;
        };
        let changed = shared.store.swap(&message.key, message.value.clone());
        Event::received(shared.device_id, &message, changed)
    };

    tracing::trace!(
        device = %shared.device_id,
        key = %event.key,
        changed = ?event.changed,
        "value stored"
    );
    shared.dispatcher.dispatch(event);
}
