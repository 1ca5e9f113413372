//! Counting semaphore bounding the number of live connections

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Outcome of waiting for admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admit {
    /// A token was taken and must be released when the connection goes away
    Token,
    /// A connection was returned to the idle queue since the caller last looked
    Returned,
    TimedOut,
}

/// Admission tokens: one is held by every live connection, idle or checked out
///
/// Waiters are also woken when a connection is returned to the idle queue,
/// since a returned connection keeps its token.
pub(crate) struct Admission {
    issued: Mutex<usize>,
    freed: Condvar,
    returns: AtomicU64,
    capacity: usize,
}

/// `None` when `timeout` is too large to represent; wait forever then
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

impl Admission {
    pub fn new(capacity: usize) -> Self {
        Self {
            issued: Mutex::new(0),
            freed: Condvar::new(),
            returns: AtomicU64::new(0),
            capacity,
        }
    }

    /// Take a token, waiting at most `timeout`. Returns `false` on timeout.
    pub fn acquire(&self, timeout: Duration) -> bool {
        self.wait(deadline_after(timeout), None) == Admit::Token
    }

    /// Take a token, or stop early once the return counter moves past `seen`
    pub fn acquire_or_returned(&self, deadline: Option<Instant>, seen: u64) -> Admit {
        self.wait(deadline, Some(seen))
    }

    fn wait(&self, deadline: Option<Instant>, seen: Option<u64>) -> Admit {
        let mut issued = self.issued.lock();
        let mut expired = false;

        loop {
            if *issued < self.capacity {
                *issued += 1;
                return Admit::Token;
            }
            if seen.is_some_and(|seen| self.returns() != seen) {
                return Admit::Returned;
            }
            if expired {
                return Admit::TimedOut;
            }
            match deadline {
                Some(deadline) => expired = self.freed.wait_until(&mut issued, deadline).timed_out(),
                None => self.freed.wait(&mut issued),
            }
        }
    }

    pub fn release(&self) {
        let mut issued = self.issued.lock();
        debug_assert!(*issued > 0, "admission token released twice");
        *issued = issued.saturating_sub(1);
        drop(issued);
        self.freed.notify_one();
    }

    /// Wake waiters after a connection was pushed to the idle queue.
    ///
    /// Must not be called while holding the idle queue lock.
    pub fn announce_return(&self) {
        self.returns.fetch_add(1, Ordering::SeqCst);
        let _issued = self.issued.lock();
        self.freed.notify_all();
    }

    pub fn returns(&self) -> u64 {
        self.returns.load(Ordering::SeqCst)
    }

    pub fn in_use(&self) -> usize {
        *self.issued.lock()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
