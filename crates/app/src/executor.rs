//! Task executors used for listener dispatch.
//!
//! Contract shared by every implementation: tasks may run out of order
//! relative to each other; whatever a single task does, it does
//! sequentially on one thread.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::{Condvar, Mutex};

use crate::config::ExecutorConfig;

/// A unit of work submitted to an executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Errors returned when submitting a task.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExecutorError {
    /// The executor was shut down and accepts no new tasks.
    #[error("executor is shut down")]
    Shutdown,
}

/// Runs submitted tasks, possibly concurrently and in any order.
pub trait TaskExecutor: Send + Sync {
    /// Submit a task.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Shutdown`] once [`shutdown`](Self::shutdown)
    /// has been called.
    fn execute(&self, task: Task) -> Result<(), ExecutorError>;

    /// Stop accepting tasks. Tasks already submitted still run.
    fn shutdown(&self);

    fn is_shutdown(&self) -> bool;
}

fn run_isolated(task: Task) {
    if catch_unwind(AssertUnwindSafe(task)).is_err() {
        tracing::error!("dispatch task panicked");
    }
}

struct PoolInner {
    sender: Mutex<Option<Sender<Task>>>,
    receiver: Receiver<Task>,
    idle: AtomicUsize,
    spawned: AtomicUsize,
    live: Mutex<usize>,
    exited: Condvar,
    config: ExecutorConfig,
}

impl std::fmt::Debug for PoolInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolInner")
            .field("queued", &self.receiver.len())
            .field("idle", &self.idle)
            .field("live", &*self.live.lock())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Dynamically sized thread pool.
///
/// A worker thread is spawned whenever a task is queued and no idle worker
/// is available; workers that stay idle for
/// [`ExecutorConfig::idle_timeout`] exit. There is no upper bound on the
/// number of threads and no backpressure on submission.
#[derive(Debug, Clone)]
pub struct ThreadPoolExecutor {
    inner: Arc<PoolInner>,
}

impl Default for ThreadPoolExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl ThreadPoolExecutor {
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            inner: Arc::new(PoolInner {
                sender: Mutex::new(Some(sender)),
                receiver,
                idle: AtomicUsize::new(0),
                spawned: AtomicUsize::new(0),
                live: Mutex::new(0),
                exited: Condvar::new(),
                config,
            }),
        }
    }

    /// Number of worker threads currently alive.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        *self.inner.live.lock()
    }

    /// Wait until the pool is shut down and every worker has exited, or
    /// until `timeout` elapses. Returns `true` when the pool is terminated.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut live = self.inner.live.lock();
        while !(self.is_shutdown() && *live == 0 && self.inner.receiver.is_empty()) {
            if self.inner.exited.wait_until(&mut live, deadline).timed_out() {
                return self.is_shutdown() && *live == 0 && self.inner.receiver.is_empty();
            }
        }
        true
    }
}

/// Spawn a worker unless enough idle workers are waiting for the queue.
fn ensure_worker(inner: &Arc<PoolInner>) {
    if inner.receiver.len() <= inner.idle.load(Ordering::Acquire) {
        return;
    }
    let n = inner.spawned.fetch_add(1, Ordering::Relaxed);
    let name = format!("{}-{n}", inner.config.thread_name_prefix);
    let worker = Arc::clone(inner);

    *inner.live.lock() += 1;
    let spawned = std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || worker_loop(&worker));
    if let Err(err) = spawned {
        *inner.live.lock() -= 1;
        tracing::error!(thread = %name, error = %err, "failed to spawn dispatch worker");
    } else {
        tracing::trace!(thread = %name, "dispatch worker spawned");
    }
}

fn worker_loop(inner: &Arc<PoolInner>) {
    loop {
        inner.idle.fetch_add(1, Ordering::AcqRel);
        let next = inner.receiver.recv_timeout(inner.config.idle_timeout);
        inner.idle.fetch_sub(1, Ordering::AcqRel);

        match next {
            Ok(task) => {
                // A submitter may have counted this worker as idle while it
                // was claiming the task; look again before going busy.
                ensure_worker(inner);
                run_isolated(task);
            }
            Err(RecvTimeoutError::Timeout) if !inner.receiver.is_empty() => {}
            // Idle for too long, or the pool is shut down and drained.
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
        }
    }

    let mut live = inner.live.lock();
    *live -= 1;
    inner.exited.notify_all();
}

impl TaskExecutor for ThreadPoolExecutor {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        {
            let sender = self.inner.sender.lock();
            let sender = sender.as_ref().ok_or(ExecutorError::Shutdown)?;
            sender.send(task).map_err(|_| ExecutorError::Shutdown)?;
        }
        ensure_worker(&self.inner);
        Ok(())
    }

    fn shutdown(&self) {
        if self.inner.sender.lock().take().is_some() {
            tracing::debug!(
                queued = self.inner.receiver.len(),
                "dispatch pool shutting down"
            );
            // Queued tasks still need a worker to drain them.
            ensure_worker(&self.inner);
            self.inner.exited.notify_all();
        }
    }

    fn is_shutdown(&self) -> bool {
        self.inner.sender.lock().is_none()
    }
}

/// Runs every task immediately on the submitting thread.
///
/// Trivially satisfies the executor contract; useful for tools and tests
/// that want deterministic dispatch.
#[derive(Debug, Default)]
pub struct CallerRunsExecutor {
    shut_down: AtomicBool,
}

impl TaskExecutor for CallerRunsExecutor {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        if self.is_shutdown() {
            return Err(ExecutorError::Shutdown);
        }
        run_isolated(task);
        Ok(())
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
    }

    fn is_shutdown(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}
