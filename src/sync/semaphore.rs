use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{trace, warn};

use super::errors::{SyncError, SyncResult};

/// Bounded counting semaphore
///
/// Permits are handed directly to the longest-waiting acquirer on release,
/// so a steady stream of new acquirers cannot starve a blocked one.
/// Pairing every `acquire` with exactly one `release` is the caller's job;
/// [`Semaphore::acquire_permit`] does it automatically.
///
/// # Examples
///
/// ```rust
/// use tasker_dispatch::Semaphore;
///
/// let semaphore = Semaphore::new(2);
/// semaphore.acquire();
/// assert_eq!(semaphore.available(), 1);
/// semaphore.release().unwrap();
/// assert_eq!(semaphore.available(), 2);
/// ```
#[derive(Clone)]
pub struct Semaphore {
    inner: Arc<SemaphoreInner>,
}

struct SemaphoreInner {
    capacity: usize,
    state: Mutex<SemaphoreState>,
}

struct SemaphoreState {
    available: usize,
    waiters: VecDeque<Arc<Waiter>>,
}

struct Waiter {
    granted: AtomicBool,
    signal: Condvar,
}

impl Waiter {
    fn new() -> Self {
        Self {
            granted: AtomicBool::new(false),
            signal: Condvar::new(),
        }
    }

    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::Acquire)
    }
}

impl Semaphore {
    /// Create a semaphore with `capacity` permits, all available
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(SemaphoreInner {
                capacity,
                state: Mutex::new(SemaphoreState {
                    available: capacity,
                    waiters: VecDeque::new(),
                }),
            }),
        }
    }

    /// Create a semaphore from a signed capacity, rejecting negative values
    pub fn try_new(capacity: i64) -> SyncResult<Self> {
        usize::try_from(capacity)
            .map(Self::new)
            .map_err(|_| SyncError::NegativeCapacity { capacity })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn available(&self) -> usize {
        self.inner.state.lock().available
    }

    /// Number of callers currently blocked in `acquire`
    pub fn waiting(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }

    /// Take a permit, blocking until one is available
    pub fn acquire(&self) {
        let mut state = self.inner.state.lock();
        if state.waiters.is_empty() && state.available > 0 {
            state.available -= 1;
            return;
        }

        let waiter = Arc::new(Waiter::new());
        state.waiters.push_back(Arc::clone(&waiter));
        trace!(waiting = state.waiters.len(), "Semaphore acquire blocked");

        while !waiter.is_granted() {
            waiter.signal.wait(&mut state);
        }
    }

    /// Take a permit if one is available without blocking
    pub fn try_acquire(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.waiters.is_empty() && state.available > 0 {
            state.available -= 1;
            true
        } else {
            false
        }
    }

    /// Take a permit, giving up after `timeout`
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        if state.waiters.is_empty() && state.available > 0 {
            state.available -= 1;
            return true;
        }

        let waiter = Arc::new(Waiter::new());
        state.waiters.push_back(Arc::clone(&waiter));

        loop {
            if waiter.is_granted() {
                return true;
            }
            if waiter.signal.wait_until(&mut state, deadline).timed_out() {
                if waiter.is_granted() {
                    return true;
                }
                state.waiters.retain(|queued| !Arc::ptr_eq(queued, &waiter));
                return false;
            }
        }
    }

    /// Take a permit that is released when the guard drops
    pub fn acquire_permit(&self) -> SemaphorePermit<'_> {
        self.acquire();
        SemaphorePermit { semaphore: self }
    }

    /// Return a permit, waking exactly one blocked acquirer if any
    ///
    /// With no waiter and every permit already available the release is
    /// rejected and the count is left unchanged.
    pub fn release(&self) -> SyncResult<()> {
        let mut state = self.inner.state.lock();

        if let Some(waiter) = state.waiters.pop_front() {
            waiter.granted.store(true, Ordering::Release);
            waiter.signal.notify_one();
            return Ok(());
        }

        if state.available >= self.inner.capacity {
            return Err(SyncError::SemaphoreOverflow {
                available: state.available,
                capacity: self.inner.capacity,
            });
        }

        state.available += 1;
        Ok(())
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Semaphore")
            .field("capacity", &self.inner.capacity)
            .field("available", &state.available)
            .field("waiting", &state.waiters.len())
            .finish()
    }
}

/// A held permit; dropping it releases the permit
#[must_use = "dropping the permit releases it immediately"]
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.semaphore.release() {
            warn!(error = %error, "Semaphore permit release rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn wait_for_waiters(semaphore: &Semaphore, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while semaphore.waiting() < count {
            assert!(Instant::now() < deadline, "waiters never arrived");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_negative_capacity_is_rejected() {
        assert_eq!(
            Semaphore::try_new(-1).unwrap_err(),
            SyncError::NegativeCapacity { capacity: -1 }
        );
        assert_eq!(Semaphore::try_new(3).unwrap().capacity(), 3);
    }

    #[test]
    fn test_try_acquire_respects_capacity() {
        let semaphore = Semaphore::new(1);
        assert!(semaphore.try_acquire());
        assert!(!semaphore.try_acquire());
        semaphore.release().unwrap();
        assert!(semaphore.try_acquire());
    }

    #[test]
    fn test_release_never_exceeds_capacity() {
        let semaphore = Semaphore::new(2);
        assert_eq!(
            semaphore.release().unwrap_err(),
            SyncError::SemaphoreOverflow {
                available: 2,
                capacity: 2
            }
        );
        assert_eq!(semaphore.available(), 2);
    }

    #[test]
    fn test_zero_capacity_blocks_until_release() {
        let semaphore = Semaphore::new(0);
        let acquirer = semaphore.clone();
        let handle = thread::spawn(move || acquirer.acquire());

        wait_for_waiters(&semaphore, 1);
        assert!(!handle.is_finished());

        semaphore.release().unwrap();
        handle.join().unwrap();
        assert_eq!(semaphore.available(), 0);
    }

    #[test]
    fn test_release_hands_off_in_fifo_order() {
        let semaphore = Semaphore::new(1);
        semaphore.acquire();

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for index in 0..3 {
            let semaphore_clone = semaphore.clone();
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                semaphore_clone.acquire();
                order.lock().push(index);
                semaphore_clone.release().unwrap();
            }));
            wait_for_waiters(&semaphore, index + 1);
        }

        semaphore.release().unwrap();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        assert_eq!(semaphore.available(), 1);
    }

    #[test]
    fn test_acquire_timeout_gives_up_and_dequeues() {
        let semaphore = Semaphore::new(1);
        semaphore.acquire();

        assert!(!semaphore.acquire_timeout(Duration::from_millis(20)));
        assert_eq!(semaphore.waiting(), 0);

        semaphore.release().unwrap();
        assert!(semaphore.acquire_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_permit_guard_releases_on_drop() {
        let semaphore = Semaphore::new(1);
        {
            let _permit = semaphore.acquire_permit();
            assert_eq!(semaphore.available(), 0);
        }
        assert_eq!(semaphore.available(), 1);
    }
}
