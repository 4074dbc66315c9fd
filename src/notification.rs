//! # Notification Contexts
//!
//! Completion callbacks and join-group notifications run on an explicit
//! execution context. [`NotifyContext::Inline`] runs the callback on the thread
//! that caused the notification; [`NotifyContext::Notifier`] hands it to a
//! dedicated serial thread so callbacks never run concurrently with each other
//! and never on a queue worker.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crossbeam::channel::{self, Sender};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::task::panic_message;

/// A boxed, single-shot notification callback
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Errors raised while setting up a notification context
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Failed to spawn notifier thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Where a callback is executed
#[derive(Clone, Default)]
pub enum NotifyContext {
    /// On the thread that triggered the notification
    #[default]
    Inline,
    /// On a dedicated serial notifier thread
    Notifier(Notifier),
}

impl NotifyContext {
    /// Run `callback` on this context
    pub fn dispatch(&self, callback: Callback) {
        match self {
            Self::Inline => run_guarded(callback),
            Self::Notifier(notifier) => notifier.execute(callback),
        }
    }
}

impl fmt::Debug for NotifyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => write!(f, "Inline"),
            Self::Notifier(notifier) => write!(f, "Notifier({})", notifier.name()),
        }
    }
}

impl From<Notifier> for NotifyContext {
    fn from(notifier: Notifier) -> Self {
        Self::Notifier(notifier)
    }
}

/// A named serial thread that executes callbacks in submission order
///
/// The thread exits once every `Notifier` clone has been dropped and the
/// callbacks already handed to it have run.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

struct NotifierInner {
    name: String,
    sender: Sender<Callback>,
    thread_id: ThreadId,
}

impl Notifier {
    /// Spawn a new notifier thread
    pub fn new(name: impl Into<String>) -> Result<Self, NotificationError> {
        let name = name.into();
        let (sender, receiver) = channel::unbounded::<Callback>();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                for callback in receiver.iter() {
                    run_guarded(callback);
                }
            })
            .map_err(|source| NotificationError::Spawn {
                name: name.clone(),
                source,
            })?;

        debug!(notifier = %name, "Notifier thread started");

        Ok(Self {
            inner: Arc::new(NotifierInner {
                name,
                sender,
                thread_id: handle.thread().id(),
            }),
        })
    }

    /// Name of the notifier thread
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether the calling thread is this notifier's thread
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    /// Queue a callback for execution on the notifier thread
    pub fn execute(&self, callback: Callback) {
        if let Err(channel::SendError(callback)) = self.inner.sender.send(callback) {
            warn!(
                notifier = %self.inner.name,
                "Notifier thread is gone, running callback inline"
            );
            run_guarded(callback);
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("name", &self.inner.name)
            .finish()
    }
}

/// Run a callback, containing any panic so the calling thread survives
pub(crate) fn run_guarded(callback: Callback) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(callback)) {
        error!(
            panic = %panic_message(payload.as_ref()),
            "Notification callback panicked"
        );
    }
}
