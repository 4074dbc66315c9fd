use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use super::{panic_message, TaskContext, TaskId, TaskOutcome};
use crate::notification::NotifyContext;
use crate::queue::QueueError;
use crate::state_machine::{
    StateMachineError, StateMachineResult, TaskEvent, TaskState, TaskStateMachine,
};

/// The work a task performs, invoked at most once
pub(crate) type WorkBody = Box<dyn FnOnce(&TaskContext) -> anyhow::Result<()> + Send + 'static>;

type CompletionCallback = Box<dyn FnOnce(&TaskOutcome) + Send + 'static>;

/// Scheduler-side hooks into a task's lifecycle
///
/// Invoked without any task lock held.
pub(crate) trait TaskObserver: Send + Sync {
    /// The task moved from `Pending` to `Ready`
    fn task_ready(&self, task: &Task);

    /// The task reached `Finished` or `Cancelled`
    fn task_terminal(&self, task: &Task, outcome: &TaskOutcome);
}

/// Result of a scheduler trying to start a task
pub(crate) enum Claim {
    Started(WorkBody),
    Unavailable(TaskState),
}

/// A cancelable unit of work with an explicit lifecycle
///
/// `Task` is a cheap handle; clones refer to the same task.
///
/// # Examples
///
/// ```rust
/// use tasker_dispatch::{Task, TaskOutcome, TaskState};
///
/// let task = Task::new(|| println!("working"));
/// assert_eq!(task.state(), TaskState::Ready);
///
/// task.run().unwrap();
/// assert_eq!(task.outcome(), Some(TaskOutcome::Succeeded));
/// ```
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

struct TaskInner {
    id: TaskId,
    name: Option<String>,
    asynchronous: bool,
    dependencies: Vec<TaskId>,
    cancel_requested: AtomicBool,
    core: Mutex<TaskCore>,
    terminal: Condvar,
}

struct TaskCore {
    machine: TaskStateMachine,
    body: Option<WorkBody>,
    outcome: Option<TaskOutcome>,
    /// Dependencies not yet terminal, plus one while construction is registering them
    unresolved_dependencies: usize,
    /// An asynchronous body has returned and the task awaits `finish`/`fail`
    awaiting_finish: bool,
    dependents: Vec<Weak<TaskInner>>,
    callbacks: Vec<(NotifyContext, CompletionCallback)>,
    observer: Option<Arc<dyn TaskObserver>>,
}

impl Task {
    /// Create a synchronous task with no dependencies
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        TaskBuilder::new().build(move |_| body())
    }

    /// Create a task whose body can observe cancellation through its context
    pub fn with_context<F>(body: F) -> Self
    where
        F: FnOnce(&TaskContext) + Send + 'static,
    {
        TaskBuilder::new().build(body)
    }

    /// Create a task whose body may fail; an `Err` finishes the task with an error
    pub fn fallible<F>(body: F) -> Self
    where
        F: FnOnce(&TaskContext) -> anyhow::Result<()> + Send + 'static,
    {
        TaskBuilder::new().build_fallible(body)
    }

    pub fn builder() -> TaskBuilder {
        TaskBuilder::new()
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn is_asynchronous(&self) -> bool {
        self.inner.asynchronous
    }

    /// Identities of the tasks this task waited on at construction
    pub fn dependencies(&self) -> &[TaskId] {
        &self.inner.dependencies
    }

    pub fn state(&self) -> TaskState {
        self.inner.core.lock().machine.current_state()
    }

    /// Whether cancellation was requested before the task became terminal
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::SeqCst)
    }

    /// Whether the task reached `Finished` or `Cancelled`
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn outcome(&self) -> Option<TaskOutcome> {
        self.inner.core.lock().outcome.clone()
    }

    /// Cancel the task
    ///
    /// Pending or ready tasks move straight to `Cancelled` and their work body
    /// is dropped without being invoked. A running body is never interrupted:
    /// it only sees [`TaskContext::is_cancelled`] turn true, and the task ends
    /// `Cancelled` if the body then returns normally. An asynchronous task
    /// whose body already returned is cancelled outright, since nothing is
    /// left running. Terminal tasks are left untouched.
    pub fn cancel(&self) {
        let settled = {
            let mut core = self.inner.core.lock();
            let state = core.machine.current_state();
            if state.is_terminal() {
                return;
            }
            self.inner.cancel_requested.store(true, Ordering::SeqCst);

            if state == TaskState::Executing && !core.awaiting_finish {
                debug!(task_id = %self.id(), "Cancellation requested for executing task");
                return;
            }
            match Self::settle_locked(&mut core, &TaskOutcome::Cancelled) {
                Ok(settled) => settled,
                Err(error) => {
                    warn!(task_id = %self.id(), error = %error, "Cancellation rejected");
                    return;
                }
            }
        };

        self.publish_settled(settled, TaskOutcome::Cancelled);
    }

    /// Run the task on the calling thread
    ///
    /// Only valid for a `Ready` task that no queue owns. A synchronous task is
    /// `Finished` when this returns; an asynchronous task stays `Executing`
    /// until [`Task::finish`] or [`Task::fail`] is called.
    pub fn run(&self) -> StateMachineResult<()> {
        let claim = {
            let mut core = self.inner.core.lock();
            if core.observer.is_some() {
                return Err(StateMachineError::OwnedByQueue { task_id: self.id() });
            }
            Self::claim_locked(&mut core)
        };

        match claim {
            Claim::Started(body) => {
                self.execute(body);
                Ok(())
            }
            Claim::Unavailable(from) => Err(StateMachineError::InvalidTransition {
                from,
                event: TaskEvent::Start.event_type().to_string(),
            }),
        }
    }

    /// Finish an executing asynchronous task successfully
    pub fn finish(&self) -> StateMachineResult<()> {
        self.ensure_asynchronous()?;
        self.complete(TaskOutcome::Succeeded)
    }

    /// Finish an executing asynchronous task with an error
    pub fn fail(&self, error: impl Into<String>) -> StateMachineResult<()> {
        self.ensure_asynchronous()?;
        self.complete(TaskOutcome::Failed(error.into()))
    }

    /// Acknowledge a cancellation request on an executing asynchronous task
    ///
    /// For operations that notice [`Task::is_cancelled`] and abandon their
    /// work before the body returns. Fails with
    /// [`StateMachineError::CancellationNotRequested`] unless `cancel` was
    /// called first.
    pub fn finish_cancelled(&self) -> StateMachineResult<()> {
        self.ensure_asynchronous()?;
        let settled = {
            let mut core = self.inner.core.lock();
            if !self.is_cancelled() {
                return Err(StateMachineError::CancellationNotRequested { task_id: self.id() });
            }
            Self::settle_locked(&mut core, &TaskOutcome::Cancelled)?
        };
        self.publish_settled(settled, TaskOutcome::Cancelled);
        Ok(())
    }

    /// Register a callback that runs once the task is terminal
    ///
    /// The callback runs on the thread that drives the terminal transition
    /// (a queue worker, the thread calling `cancel`, or the thread calling
    /// `finish`). If the task is already terminal it runs immediately on the
    /// calling thread.
    pub fn on_completion<F>(&self, callback: F)
    where
        F: FnOnce(&TaskOutcome) + Send + 'static,
    {
        self.on_completion_on(NotifyContext::Inline, callback);
    }

    /// Register a completion callback that runs on the given context
    pub fn on_completion_on<F>(&self, context: NotifyContext, callback: F)
    where
        F: FnOnce(&TaskOutcome) + Send + 'static,
    {
        let mut core = self.inner.core.lock();
        match core.outcome.clone() {
            Some(outcome) => {
                drop(core);
                context.dispatch(Box::new(move || callback(&outcome)));
            }
            None => core.callbacks.push((context, Box::new(callback))),
        }
    }

    /// Block until the task is terminal
    pub fn wait(&self) -> TaskOutcome {
        let mut core = self.inner.core.lock();
        loop {
            if let Some(outcome) = &core.outcome {
                return outcome.clone();
            }
            self.inner.terminal.wait(&mut core);
        }
    }

    /// Block until the task is terminal or the timeout elapses
    pub fn wait_timeout(&self, timeout: Duration) -> Option<TaskOutcome> {
        let deadline = Instant::now() + timeout;
        let mut core = self.inner.core.lock();
        loop {
            if let Some(outcome) = &core.outcome {
                return Some(outcome.clone());
            }
            if self
                .inner
                .terminal
                .wait_until(&mut core, deadline)
                .timed_out()
            {
                return core.outcome.clone();
            }
        }
    }

    fn ensure_asynchronous(&self) -> StateMachineResult<()> {
        if self.inner.asynchronous {
            Ok(())
        } else {
            Err(StateMachineError::NotAsynchronous { task_id: self.id() })
        }
    }

    /// Hand scheduling authority to a queue
    pub(crate) fn attach_observer(&self, observer: Arc<dyn TaskObserver>) -> Result<(), QueueError> {
        let mut core = self.inner.core.lock();
        if core.observer.is_some() {
            return Err(QueueError::AlreadyEnqueued { task_id: self.id() });
        }
        let state = core.machine.current_state();
        if !matches!(state, TaskState::Pending | TaskState::Ready) {
            return Err(QueueError::TaskNotSubmittable {
                task_id: self.id(),
                state,
            });
        }
        core.observer = Some(observer);
        Ok(())
    }

    /// Move a ready task to `Executing` and take its work body
    pub(crate) fn claim(&self) -> Claim {
        Self::claim_locked(&mut self.inner.core.lock())
    }

    fn claim_locked(core: &mut TaskCore) -> Claim {
        let state = core.machine.current_state();
        if !state.is_runnable() {
            return Claim::Unavailable(state);
        }
        let Some(body) = core.body.take() else {
            return Claim::Unavailable(state);
        };
        match core.machine.transition(&TaskEvent::Start) {
            Ok(_) => Claim::Started(body),
            Err(_) => {
                core.body = Some(body);
                Claim::Unavailable(state)
            }
        }
    }

    /// Invoke a claimed work body and record its result
    ///
    /// A body that returns normally after cancellation was requested ends
    /// `Cancelled`; errors and panics still end `Finished` with a failure.
    pub(crate) fn execute(&self, body: WorkBody) {
        let context = TaskContext::new(self.clone());
        let result = catch_unwind(AssertUnwindSafe(|| body(&context)));

        let outcome = match result {
            Ok(Ok(())) => return self.body_returned(),
            Ok(Err(error)) => TaskOutcome::Failed(format!("{error:#}")),
            Err(payload) => TaskOutcome::Failed(format!(
                "work body panicked: {}",
                panic_message(payload.as_ref())
            )),
        };

        if let Err(error) = self.complete(outcome) {
            // An asynchronous body that signalled completion and then errored
            warn!(task_id = %self.id(), error = %error, "Ignoring late work body result");
        }
    }

    /// Settle a body that returned normally
    ///
    /// Decided under the core lock so a concurrent `cancel` is either seen
    /// here or finds the task already terminal.
    fn body_returned(&self) {
        let (settled, outcome) = {
            let mut core = self.inner.core.lock();
            if core.machine.current_state() != TaskState::Executing {
                // An asynchronous body signalled completion itself
                return;
            }
            let outcome = if self.is_cancelled() {
                TaskOutcome::Cancelled
            } else if self.inner.asynchronous {
                core.awaiting_finish = true;
                return;
            } else {
                TaskOutcome::Succeeded
            };
            match Self::settle_locked(&mut core, &outcome) {
                Ok(settled) => (settled, outcome),
                Err(error) => {
                    warn!(task_id = %self.id(), error = %error, "Ignoring work body result");
                    return;
                }
            }
        };
        self.publish_settled(settled, outcome);
    }

    /// Drive the task into a terminal state and fan out notifications
    pub(crate) fn complete(&self, outcome: TaskOutcome) -> StateMachineResult<()> {
        let settled = Self::settle_locked(&mut self.inner.core.lock(), &outcome)?;
        self.publish_settled(settled, outcome);
        Ok(())
    }

    /// Apply the terminal transition and detach everything that must be
    /// notified once the core lock is released
    fn settle_locked(core: &mut TaskCore, outcome: &TaskOutcome) -> StateMachineResult<Settled> {
        core.machine.transition(&outcome.to_event())?;
        core.outcome = Some(outcome.clone());
        core.awaiting_finish = false;
        Ok(Settled {
            body: core.body.take(),
            callbacks: std::mem::take(&mut core.callbacks),
            dependents: std::mem::take(&mut core.dependents),
            observer: core.observer.clone(),
        })
    }

    fn publish_settled(&self, settled: Settled, outcome: TaskOutcome) {
        let Settled {
            body,
            callbacks,
            dependents,
            observer,
        } = settled;
        drop(body);
        self.inner.terminal.notify_all();

        debug!(
            task_id = %self.id(),
            task_name = self.name(),
            outcome = %outcome,
            "Task reached terminal state"
        );

        for (context, callback) in callbacks {
            let outcome = outcome.clone();
            context.dispatch(Box::new(move || callback(&outcome)));
        }

        for dependent in dependents.iter().filter_map(Weak::upgrade) {
            Task { inner: dependent }.dependency_resolved();
        }

        if let Some(observer) = observer {
            observer.task_terminal(self, &outcome);
        }
    }

    /// Register `self` as waiting on `dependency`
    fn register_dependency(&self, dependency: &Task) {
        self.inner.core.lock().unresolved_dependencies += 1;

        let already_terminal = {
            let mut core = dependency.inner.core.lock();
            if core.machine.current_state().satisfies_dependencies() {
                true
            } else {
                core.dependents.push(Arc::downgrade(&self.inner));
                false
            }
        };

        if already_terminal {
            self.dependency_resolved();
        }
    }

    fn dependency_resolved(&self) {
        let observer = {
            let mut core = self.inner.core.lock();
            core.unresolved_dependencies = core.unresolved_dependencies.saturating_sub(1);
            if core.unresolved_dependencies > 0
                || core.machine.current_state() != TaskState::Pending
            {
                return;
            }
            if core
                .machine
                .transition(&TaskEvent::DependenciesResolved)
                .is_err()
            {
                return;
            }
            core.observer.clone()
        };

        if let Some(observer) = observer {
            observer.task_ready(self);
        }
    }
}

/// Everything a terminal transition hands off for notification
struct Settled {
    body: Option<WorkBody>,
    callbacks: Vec<(NotifyContext, CompletionCallback)>,
    dependents: Vec<Weak<TaskInner>>,
    observer: Option<Arc<dyn TaskObserver>>,
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Task {}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("asynchronous", &self.inner.asynchronous)
            .field("state", &self.state())
            .finish()
    }
}

/// Builder for tasks with names, dependencies or asynchronous completion
///
/// ```rust
/// use tasker_dispatch::{Task, TaskState};
///
/// let download = Task::new(|| {});
/// let render = Task::builder()
///     .name("render")
///     .depends_on(&download)
///     .build(|_ctx| {});
///
/// assert_eq!(render.state(), TaskState::Pending);
/// download.run().unwrap();
/// assert_eq!(render.state(), TaskState::Ready);
/// ```
#[derive(Default)]
pub struct TaskBuilder {
    name: Option<String>,
    dependencies: Vec<Task>,
    asynchronous: bool,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The built task stays `Pending` until `task` is `Finished` or `Cancelled`
    pub fn depends_on(mut self, task: &Task) -> Self {
        self.dependencies.push(task.clone());
        self
    }

    pub fn depends_on_all<'a>(mut self, tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        self.dependencies.extend(tasks.into_iter().cloned());
        self
    }

    /// Asynchronous tasks stay `Executing` after their body returns until
    /// `finish` or `fail` is called
    pub fn asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    pub fn build<F>(self, body: F) -> Task
    where
        F: FnOnce(&TaskContext) + Send + 'static,
    {
        self.build_fallible(move |context| {
            body(context);
            Ok(())
        })
    }

    pub fn build_fallible<F>(self, body: F) -> Task
    where
        F: FnOnce(&TaskContext) -> anyhow::Result<()> + Send + 'static,
    {
        self.build_boxed(Box::new(body))
    }

    pub(crate) fn build_boxed(self, body: WorkBody) -> Task {
        let task = Task {
            inner: Arc::new(TaskInner {
                id: TaskId::new(),
                name: self.name,
                asynchronous: self.asynchronous,
                dependencies: self.dependencies.iter().map(Task::id).collect(),
                cancel_requested: AtomicBool::new(false),
                core: Mutex::new(TaskCore {
                    machine: TaskStateMachine::new(),
                    body: Some(body),
                    outcome: None,
                    unresolved_dependencies: 1,
                    awaiting_finish: false,
                    dependents: Vec::new(),
                    callbacks: Vec::new(),
                    observer: None,
                }),
                terminal: Condvar::new(),
            }),
        };

        for dependency in &self.dependencies {
            task.register_dependency(dependency);
        }
        task.dependency_resolved();

        task
    }
}
