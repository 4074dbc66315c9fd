use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, error};

use super::errors::{QueueError, QueueResult};
use super::limit::ConcurrencyLimit;
use crate::config::DispatchConfig;
use crate::constants::{events, system};
use crate::events::{EventPublisher, PublishedEvent};
use crate::execution::{WorkerPool, WorkerPoolConfig};
use crate::logging::{log_error, log_queue_operation, log_task_operation};
use crate::state_machine::TaskState;
use crate::task::{Claim, Task, TaskId, TaskObserver, TaskOutcome};

/// Runs submitted tasks on its own worker pool, honoring a concurrency limit
/// and task dependencies
///
/// Ready tasks start in submission order while fewer than the limit are
/// executing. A task that is still waiting on dependencies never holds up a
/// ready task submitted after it, and is only looked at again once it turns
/// ready.
///
/// # Examples
///
/// ```rust
/// use tasker_dispatch::{Task, TaskQueue};
///
/// let queue = TaskQueue::serial();
/// let first = Task::new(|| println!("first"));
/// let second = Task::builder().depends_on(&first).build(|_| println!("second"));
///
/// queue.submit(&second).unwrap();
/// queue.submit(&first).unwrap();
/// queue.wait_until_all_finished().unwrap();
/// ```
#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<QueueShared>,
}

struct QueueShared {
    name: String,
    state: Mutex<QueueState>,
    drained: Condvar,
    pool: WorkerPool,
    events: EventPublisher,
    link: Arc<QueueLink>,
}

struct QueueState {
    limit: ConcurrencyLimit,
    suspended: bool,
    /// Submitted tasks not yet started, with their submission sequence
    waiting: HashMap<TaskId, (u64, Task)>,
    /// Waiting tasks that are `Ready`, keyed by submission sequence
    ready: BTreeMap<u64, TaskId>,
    /// Started tasks not yet terminal
    running: HashMap<TaskId, Task>,
    submitted: u64,
    completed: u64,
}

/// Task observer that routes lifecycle hooks back to the owning queue
struct QueueLink(Weak<QueueShared>);

impl TaskObserver for QueueLink {
    fn task_ready(&self, task: &Task) {
        if let Some(shared) = self.0.upgrade() {
            shared.task_ready(task);
        }
    }

    fn task_terminal(&self, task: &Task, outcome: &TaskOutcome) {
        if let Some(shared) = self.0.upgrade() {
            shared.task_terminal(task, outcome);
        }
    }
}

impl TaskQueue {
    /// Create an unnamed queue with the given limit
    pub fn new(limit: ConcurrencyLimit) -> Self {
        Self::with_name(system::DEFAULT_QUEUE_NAME, limit)
    }

    /// Queue that runs one task at a time
    pub fn serial() -> Self {
        Self::new(ConcurrencyLimit::Serial)
    }

    /// Queue that runs every ready task at once
    pub fn concurrent() -> Self {
        Self::new(ConcurrencyLimit::Unbounded)
    }

    pub fn with_name(name: impl Into<String>, limit: ConcurrencyLimit) -> Self {
        let name = name.into();
        let pool_config = WorkerPoolConfig {
            thread_name_prefix: name.clone(),
            ..WorkerPoolConfig::default()
        };
        Self::build(name, limit, false, pool_config, EventPublisher::default())
    }

    /// Build a queue from loaded configuration
    pub fn from_config(config: &DispatchConfig) -> Self {
        let queue = &config.queue;
        let pool_config = WorkerPoolConfig {
            thread_name_prefix: queue.thread_name_prefix.clone(),
            keep_alive: queue.worker_keep_alive(),
        };
        Self::build(
            queue.name.clone(),
            queue.max_concurrent,
            queue.start_suspended,
            pool_config,
            EventPublisher::new(config.events.channel_capacity),
        )
    }

    fn build(
        name: String,
        limit: ConcurrencyLimit,
        suspended: bool,
        pool_config: WorkerPoolConfig,
        events: EventPublisher,
    ) -> Self {
        let shared = Arc::new_cyclic(|weak| QueueShared {
            name,
            state: Mutex::new(QueueState {
                limit,
                suspended,
                waiting: HashMap::new(),
                ready: BTreeMap::new(),
                running: HashMap::new(),
                submitted: 0,
                completed: 0,
            }),
            drained: Condvar::new(),
            pool: WorkerPool::new(pool_config),
            events,
            link: Arc::new(QueueLink(weak.clone())),
        });

        log_queue_operation(
            "create",
            &shared.name,
            "ok",
            Some(format!("max_concurrent={limit} suspended={suspended}").as_str()),
        );

        Self { shared }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Hand a task to the queue
    ///
    /// Never blocks. Fails if the task already belongs to a queue or has
    /// already started or finished.
    pub fn submit(&self, task: &Task) -> QueueResult<()> {
        {
            let mut state = self.shared.state.lock();
            let observer: Arc<dyn TaskObserver> = self.shared.link.clone();
            task.attach_observer(observer)?;
            let sequence = state.submitted;
            state.waiting.insert(task.id(), (sequence, task.clone()));
            // Tasks that turn ready after this check arrive through `task_ready`
            if task.state() == TaskState::Ready {
                state.ready.insert(sequence, task.id());
            }
            state.submitted += 1;
        }

        debug!(queue = %self.shared.name, task_id = %task.id(), task_name = task.name(), "Task submitted");
        self.shared
            .publish(events::TASK_SUBMITTED, Some(task.id()), json!({"name": task.name()}));

        self.shared.schedule();
        Ok(())
    }

    /// Submit every task, stopping at the first rejection
    pub fn submit_all<'a>(&self, tasks: impl IntoIterator<Item = &'a Task>) -> QueueResult<()> {
        tasks.into_iter().try_for_each(|task| self.submit(task))
    }

    /// Wrap a closure in a task and submit it
    pub fn submit_fn<F>(&self, body: F) -> QueueResult<Task>
    where
        F: FnOnce() + Send + 'static,
    {
        let task = Task::new(body);
        self.submit(&task)?;
        Ok(task)
    }

    /// Pause or resume dispatch; executing tasks are never interrupted
    pub fn set_suspended(&self, suspended: bool) {
        let changed = {
            let mut state = self.shared.state.lock();
            let changed = state.suspended != suspended;
            state.suspended = suspended;
            changed
        };
        if !changed {
            return;
        }

        let (operation, event) = if suspended {
            ("suspend", events::QUEUE_SUSPENDED)
        } else {
            ("resume", events::QUEUE_RESUMED)
        };
        log_queue_operation(operation, &self.shared.name, "ok", None);
        self.shared.publish(event, None, json!({}));

        if !suspended {
            self.shared.schedule();
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.shared.state.lock().suspended
    }

    /// Change the limit; applies from the next scheduling pass
    pub fn set_max_concurrent(&self, limit: ConcurrencyLimit) {
        self.shared.state.lock().limit = limit;
        log_queue_operation(
            "set_max_concurrent",
            &self.shared.name,
            "ok",
            Some(limit.to_string().as_str()),
        );
        self.shared.schedule();
    }

    pub fn max_concurrent(&self) -> ConcurrencyLimit {
        self.shared.state.lock().limit
    }

    /// Cancel every task the queue still owns
    ///
    /// Waiting tasks are cancelled outright; executing tasks only see their
    /// cancellation flag raised.
    pub fn cancel_all(&self) {
        let tasks: Vec<Task> = {
            let state = self.shared.state.lock();
            state
                .waiting
                .values()
                .map(|(_, task)| task)
                .chain(state.running.values())
                .cloned()
                .collect()
        };

        log_queue_operation(
            "cancel_all",
            &self.shared.name,
            "ok",
            Some(format!("tasks={}", tasks.len()).as_str()),
        );
        for task in tasks {
            task.cancel();
        }
    }

    /// Block until every submitted task is terminal
    ///
    /// Returns [`QueueError::WaitFromWorker`] when called from a task running
    /// on this queue, which would otherwise wait on itself forever. Tasks
    /// that never become ready (an unsubmitted dependency, a suspended
    /// queue) keep this call blocked.
    pub fn wait_until_all_finished(&self) -> QueueResult<()> {
        self.ensure_not_worker()?;
        let mut state = self.shared.state.lock();
        while !state.is_drained() {
            self.shared.drained.wait(&mut state);
        }
        Ok(())
    }

    /// Like [`TaskQueue::wait_until_all_finished`], giving up after `timeout`
    pub fn wait_until_all_finished_timeout(&self, timeout: Duration) -> QueueResult<bool> {
        self.ensure_not_worker()?;
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while !state.is_drained() {
            if self
                .shared
                .drained
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return Ok(state.is_drained());
            }
        }
        Ok(true)
    }

    /// Tasks owned by the queue that are not yet terminal
    pub fn len(&self) -> usize {
        let state = self.shared.state.lock();
        state.waiting.len() + state.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tasks currently in `Executing` on behalf of this queue
    pub fn executing_count(&self) -> usize {
        self.shared.state.lock().running.len()
    }

    pub fn get_stats(&self) -> QueueStats {
        let state = self.shared.state.lock();
        QueueStats {
            submitted: state.submitted,
            completed: state.completed,
            waiting: state.waiting.len(),
            executing: state.running.len(),
            suspended: state.suspended,
        }
    }

    /// Subscribe to this queue's lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.shared.events.subscribe()
    }

    fn ensure_not_worker(&self) -> QueueResult<()> {
        if self.shared.pool.is_worker_thread() {
            Err(QueueError::WaitFromWorker {
                queue: self.shared.name.clone(),
            })
        } else {
            Ok(())
        }
    }
}

impl QueueState {
    fn is_drained(&self) -> bool {
        self.waiting.is_empty() && self.running.is_empty()
    }
}

impl QueueShared {
    /// Start ready tasks while the limit allows
    fn schedule(&self) {
        let launches = {
            let mut state = self.state.lock();
            if state.suspended {
                return;
            }

            let mut launches = Vec::new();
            while state.limit.admits(state.running.len()) {
                let Some((_, task_id)) = state.ready.pop_first() else {
                    break;
                };
                let Some((_, task)) = state.waiting.get(&task_id) else {
                    continue;
                };
                // Cancelled tasks are dropped here and removed by `task_terminal`
                if let Claim::Started(body) = task.claim() {
                    let task = task.clone();
                    state.waiting.remove(&task_id);
                    state.running.insert(task_id, task.clone());
                    launches.push((task, body));
                }
            }
            launches
        };

        for (task, body) in launches {
            debug!(queue = %self.name, task_id = %task.id(), "Task started");
            self.publish(events::TASK_STARTED, Some(task.id()), json!({"name": task.name()}));

            let job_task = task.clone();
            if let Err(error) = self.pool.execute(Box::new(move || job_task.execute(body))) {
                let error = QueueError::worker_unavailable(&self.name, &error);
                log_error(
                    "task_queue",
                    "dispatch",
                    &error.to_string(),
                    Some(self.name.as_str()),
                );
                if let Err(transition) = task.complete(TaskOutcome::Failed(error.to_string())) {
                    error!(task_id = %task.id(), error = %transition, "Failed to record worker failure");
                }
            }
        }
    }

    /// Index a task whose dependencies resolved after submission
    fn task_ready(&self, task: &Task) {
        {
            let mut state = self.state.lock();
            let Some(&(sequence, _)) = state.waiting.get(&task.id()) else {
                return;
            };
            state.ready.insert(sequence, task.id());
        }
        self.schedule();
    }

    fn task_terminal(&self, task: &Task, outcome: &TaskOutcome) {
        let drained = {
            let mut state = self.state.lock();
            if state.running.remove(&task.id()).is_none() {
                if let Some((sequence, _)) = state.waiting.remove(&task.id()) {
                    state.ready.remove(&sequence);
                }
            }
            state.completed += 1;
            state.is_drained()
        };

        if let TaskOutcome::Failed(message) = outcome {
            log_task_operation(
                "execute",
                Some(task.id()),
                task.name(),
                "failed",
                Some(message.as_str()),
            );
        }
        self.publish(outcome.event_name(), Some(task.id()), json!({"outcome": outcome}));

        if drained {
            self.drained.notify_all();
            self.publish(events::QUEUE_DRAINED, None, json!({}));
        }

        self.schedule();
    }

    fn publish(&self, event: &str, task_id: Option<TaskId>, context: serde_json::Value) {
        self.events.publish(event, &self.name, task_id, context);
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.get_stats();
        f.debug_struct("TaskQueue")
            .field("name", &self.shared.name)
            .field("max_concurrent", &self.max_concurrent())
            .field("stats", &stats)
            .finish()
    }
}

/// Snapshot of a queue's bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub submitted: u64,
    pub completed: u64,
    pub waiting: usize,
    pub executing: usize,
    pub suspended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_secs(10);

    #[test]
    fn test_submit_runs_task() {
        let queue = TaskQueue::concurrent();
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let task = queue
            .submit_fn(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(queue.wait_until_all_finished_timeout(WAIT).unwrap());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(task.state(), TaskState::Finished);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_double_submit_is_rejected() {
        let queue = TaskQueue::serial();
        queue.set_suspended(true);
        let task = Task::new(|| {});
        queue.submit(&task).unwrap();

        assert_eq!(
            queue.submit(&task).unwrap_err(),
            QueueError::AlreadyEnqueued { task_id: task.id() }
        );
        let other = TaskQueue::serial();
        assert!(matches!(
            other.submit(&task),
            Err(QueueError::AlreadyEnqueued { .. })
        ));
    }

    #[test]
    fn test_terminal_task_is_not_submittable() {
        let queue = TaskQueue::serial();
        let task = Task::new(|| {});
        task.cancel();
        assert_eq!(
            queue.submit(&task).unwrap_err(),
            QueueError::TaskNotSubmittable {
                task_id: task.id(),
                state: TaskState::Cancelled
            }
        );
    }

    #[test]
    fn test_queue_owned_task_cannot_be_run_manually() {
        let queue = TaskQueue::serial();
        queue.set_suspended(true);
        let task = Task::new(|| {});
        queue.submit(&task).unwrap();
        assert!(task.run().is_err());
        assert_eq!(task.state(), TaskState::Ready);
    }

    #[test]
    fn test_suspended_queue_holds_tasks() {
        let queue = TaskQueue::concurrent();
        queue.set_suspended(true);
        let task = queue.submit_fn(|| {}).unwrap();

        assert!(!queue.wait_until_all_finished_timeout(Duration::from_millis(30)).unwrap());
        assert_eq!(task.state(), TaskState::Ready);

        queue.set_suspended(false);
        assert!(queue.wait_until_all_finished_timeout(WAIT).unwrap());
        assert_eq!(task.state(), TaskState::Finished);
    }

    #[test]
    fn test_cancel_waiting_task_frees_queue() {
        let queue = TaskQueue::serial();
        queue.set_suspended(true);
        let task = queue.submit_fn(|| panic!("must not run")).unwrap();

        task.cancel();
        assert!(queue.is_empty());
        assert!(queue.wait_until_all_finished_timeout(WAIT).unwrap());
        assert_eq!(queue.get_stats().completed, 1);
    }

    #[test]
    fn test_wait_from_worker_is_rejected() {
        let queue = TaskQueue::serial();
        let inner = queue.clone();
        let (tx, rx) = std::sync::mpsc::channel();
        queue
            .submit_fn(move || {
                tx.send(inner.wait_until_all_finished()).unwrap();
            })
            .unwrap();

        let result = rx.recv_timeout(WAIT).unwrap();
        assert!(matches!(result, Err(QueueError::WaitFromWorker { .. })));
        assert!(queue.wait_until_all_finished_timeout(WAIT).unwrap());
    }

    #[test]
    fn test_stats_track_submissions() {
        let queue = TaskQueue::with_name("stats", ConcurrencyLimit::Serial);
        for _ in 0..3 {
            queue.submit_fn(|| {}).unwrap();
        }
        assert!(queue.wait_until_all_finished_timeout(WAIT).unwrap());

        let stats = queue.get_stats();
        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.executing, 0);
        assert_eq!(queue.name(), "stats");
    }
}
