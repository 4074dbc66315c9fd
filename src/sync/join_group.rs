use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use super::errors::{SyncError, SyncResult};
use crate::notification::{Callback, NotifyContext};
use crate::task::Task;

/// Enter/leave counter that notifies once the count balances to zero
///
/// Every `enter` must be matched by exactly one `leave`. More enters than
/// leaves leaves the group unbalanced forever: registered callbacks never
/// fire and `wait` never returns. A `leave` at zero is reported as
/// [`SyncError::UnbalancedLeave`].
///
/// # Examples
///
/// ```rust
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use tasker_dispatch::JoinGroup;
///
/// let group = JoinGroup::new();
/// let done = Arc::new(AtomicBool::new(false));
///
/// group.enter();
/// let flag = Arc::clone(&done);
/// group.notify(move || flag.store(true, Ordering::SeqCst));
/// assert!(!done.load(Ordering::SeqCst));
///
/// group.leave().unwrap();
/// assert!(done.load(Ordering::SeqCst));
/// ```
#[derive(Clone, Default)]
pub struct JoinGroup {
    inner: Arc<JoinGroupInner>,
}

#[derive(Default)]
struct JoinGroupInner {
    state: Mutex<GroupState>,
    balanced: Condvar,
}

#[derive(Default)]
struct GroupState {
    pending: usize,
    callbacks: Vec<(NotifyContext, Callback)>,
}

impl JoinGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outstanding enters not yet matched by a leave
    pub fn pending(&self) -> usize {
        self.inner.state.lock().pending
    }

    pub fn enter(&self) {
        self.inner.state.lock().pending += 1;
    }

    /// Match a previous `enter`; firing callbacks when the count reaches zero
    pub fn leave(&self) -> SyncResult<()> {
        let callbacks = {
            let mut state = self.inner.state.lock();
            if state.pending == 0 {
                warn!("Join group leave without a matching enter");
                return Err(SyncError::UnbalancedLeave);
            }
            state.pending -= 1;
            if state.pending > 0 {
                return Ok(());
            }
            std::mem::take(&mut state.callbacks)
        };

        self.inner.balanced.notify_all();
        debug!(callbacks = callbacks.len(), "Join group balanced");

        for (context, callback) in callbacks {
            context.dispatch(callback);
        }
        Ok(())
    }

    /// Run `callback` on the thread that performs the balancing `leave`
    ///
    /// If the group is already balanced the callback runs immediately on
    /// the calling thread.
    pub fn notify<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.notify_on(NotifyContext::Inline, callback);
    }

    /// Run `callback` on `context` the next time the group balances
    pub fn notify_on<F>(&self, context: NotifyContext, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        if state.pending == 0 {
            drop(state);
            context.dispatch(Box::new(callback));
        } else {
            state.callbacks.push((context, Box::new(callback)));
        }
    }

    /// Block until the group is balanced
    pub fn wait(&self) {
        let mut state = self.inner.state.lock();
        while state.pending > 0 {
            self.inner.balanced.wait(&mut state);
        }
    }

    /// Block until the group is balanced or the timeout elapses
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while state.pending > 0 {
            if self
                .inner
                .balanced
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.pending == 0;
            }
        }
        true
    }

    /// Enter now and leave when the returned guard drops
    pub fn member(&self) -> GroupMember {
        self.enter();
        GroupMember {
            group: self.clone(),
        }
    }

    /// Enter now and leave once `task` is terminal
    pub fn track(&self, task: &Task) {
        let member = self.member();
        task.on_completion(move |_| drop(member));
    }
}

impl fmt::Debug for JoinGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("JoinGroup")
            .field("pending", &state.pending)
            .field("callbacks", &state.callbacks.len())
            .finish()
    }
}

/// Membership token from [`JoinGroup::member`]
#[must_use = "dropping the member leaves the group immediately"]
pub struct GroupMember {
    group: JoinGroup,
}

impl Drop for GroupMember {
    fn drop(&mut self) {
        if let Err(error) = self.group.leave() {
            warn!(error = %error, "Group member leave rejected");
        }
    }
}
