//! Worker Pool for Queue-Owned Task Execution

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::constants::system;
use crate::task::panic_message;

/// A unit of work handed to a worker thread
pub type Job = Box<dyn FnOnce() + Send + 'static>;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Pool that owns the current thread, if it is a pool worker
    static CURRENT_POOL: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Worker pool configuration
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Prefix for worker thread names, suffixed with a sequence number
    pub thread_name_prefix: String,
    /// Idle time after which a worker thread exits
    pub keep_alive: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: system::DEFAULT_THREAD_NAME_PREFIX.to_string(),
            keep_alive: Duration::from_millis(system::DEFAULT_WORKER_KEEP_ALIVE_MS),
        }
    }
}

/// Lazily grown pool of OS threads owned by one queue
///
/// Threads are spawned only when every existing worker is busy and retire
/// after `keep_alive` without work. The owning queue bounds how many jobs are
/// in flight, so the pool itself never needs a thread cap.
///
/// # Examples
///
/// ```rust
/// use tasker_dispatch::execution::{WorkerPool, WorkerPoolConfig};
/// use std::sync::mpsc;
///
/// let pool = WorkerPool::new(WorkerPoolConfig::default());
/// let (tx, rx) = mpsc::channel();
/// pool.execute(Box::new(move || tx.send(42).unwrap())).unwrap();
/// assert_eq!(rx.recv().unwrap(), 42);
/// ```
pub struct WorkerPool {
    id: u64,
    config: WorkerPoolConfig,
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    state: Arc<Mutex<PoolState>>,
}

#[derive(Debug, Default)]
struct PoolState {
    /// Live worker threads
    workers: usize,
    /// Workers waiting for a job
    idle: usize,
    /// Jobs sent but not yet picked up
    queued: usize,
    /// Sequence number for thread names
    spawned: u64,
}

impl WorkerPool {
    /// Create an empty pool; no thread is spawned until the first job
    pub fn new(config: WorkerPoolConfig) -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            config,
            sender,
            receiver,
            state: Arc::new(Mutex::new(PoolState::default())),
        }
    }

    /// Run `job` on a pool thread, spawning one if every worker is busy
    pub fn execute(&self, job: Job) -> Result<(), WorkerPoolError> {
        let mut state = self.state.lock();

        if state.queued + 1 > state.idle {
            self.spawn_worker(&mut state)?;
        }

        self.sender
            .send(job)
            .map_err(|_| WorkerPoolError::ChannelClosed)?;
        state.queued += 1;
        Ok(())
    }

    /// Whether the calling thread is one of this pool's workers
    pub fn is_worker_thread(&self) -> bool {
        CURRENT_POOL.with(|current| current.get() == Some(self.id))
    }

    pub fn get_stats(&self) -> WorkerPoolStats {
        let state = self.state.lock();
        WorkerPoolStats {
            workers: state.workers,
            idle: state.idle,
            queued: state.queued,
            spawned: state.spawned,
        }
    }

    fn spawn_worker(&self, state: &mut PoolState) -> Result<(), WorkerPoolError> {
        state.spawned += 1;
        let name = format!("{}-{}", self.config.thread_name_prefix, state.spawned);

        let worker = Worker {
            pool_id: self.id,
            receiver: self.receiver.clone(),
            state: Arc::clone(&self.state),
            keep_alive: self.config.keep_alive,
        };

        thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker.run())
            .map_err(|source| {
                error!(thread = %name, error = %source, "Failed to spawn worker thread");
                WorkerPoolError::Spawn {
                    thread: name.clone(),
                    reason: source.to_string(),
                }
            })?;

        state.workers += 1;
        state.idle += 1;
        debug!(thread = %name, workers = state.workers, "Worker thread spawned");
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let state = self.state.lock();
        if state.workers > 0 {
            info!(
                workers = state.workers,
                "Worker pool dropped, threads exit after their current job"
            );
        }
    }
}

struct Worker {
    pool_id: u64,
    receiver: Receiver<Job>,
    state: Arc<Mutex<PoolState>>,
    keep_alive: Duration,
}

impl Worker {
    fn run(self) {
        CURRENT_POOL.with(|current| current.set(Some(self.pool_id)));

        loop {
            match self.receiver.recv_timeout(self.keep_alive) {
                Ok(job) => {
                    {
                        let mut state = self.state.lock();
                        state.idle -= 1;
                        state.queued -= 1;
                    }
                    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                        error!(
                            panic = %panic_message(payload.as_ref()),
                            "Worker job panicked outside the task boundary"
                        );
                    }
                    self.state.lock().idle += 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    let mut state = self.state.lock();
                    // Stay if leaving would strand a queued job
                    if state.queued < state.idle {
                        state.idle -= 1;
                        state.workers -= 1;
                        debug!(workers = state.workers, "Idle worker thread retired");
                        return;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let mut state = self.state.lock();
                    state.idle -= 1;
                    state.workers -= 1;
                    return;
                }
            }
        }
    }
}

/// Worker pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPoolStats {
    pub workers: usize,
    pub idle: usize,
    pub queued: usize,
    pub spawned: u64,
}

/// Worker pool errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkerPoolError {
    #[error("Failed to spawn worker thread {thread}: {reason}")]
    Spawn { thread: String, reason: String },

    #[error("Worker pool channel is closed")]
    ChannelClosed,
}
