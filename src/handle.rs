//! Lock-guarded wrapper around a single pooled connection

use crate::errors::{PoolError, PoolResult};
use crate::pool::{ConnectionPool, PoolShared};

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, trace};

struct HandleState<T> {
    conn: Option<T>,
    last_used: Option<Instant>,
    generation: u64,
    pool: Option<Weak<PoolShared<T>>>,
}

/// A checked-out connection
///
/// The handle owns its connection until it is returned with
/// [`ConnectionPool::put`] or torn down with [`ConnectionPool::close`]; after
/// that it is permanently inert and every accessor fails with
/// [`PoolError::HandleClosed`].
///
/// Dropping a handle that still owns its connection returns it to the pool.
///
/// Guards returned by [`Handle::get`] and [`Handle::get_mut`] must be dropped
/// before the handle is passed back to the pool.
pub struct Handle<T> {
    state: RwLock<HandleState<T>>,
}

impl<T> Handle<T> {
    pub(crate) fn new(conn: T, generation: u64, pool: Weak<PoolShared<T>>) -> Self {
        Self {
            state: RwLock::new(HandleState {
                conn: Some(conn),
                last_used: Some(Instant::now()),
                generation,
                pool: Some(pool),
            }),
        }
    }

    /// Borrow the connection
    pub fn get(&self) -> PoolResult<MappedRwLockReadGuard<'_, T>> {
        RwLockReadGuard::try_map(self.state.read(), |state| state.conn.as_ref())
            .map_err(|_| PoolError::HandleClosed)
    }

    /// Borrow the connection mutably
    pub fn get_mut(&self) -> PoolResult<MappedRwLockWriteGuard<'_, T>> {
        RwLockWriteGuard::try_map(self.state.write(), |state| state.conn.as_mut())
            .map_err(|_| PoolError::HandleClosed)
    }

    /// Tear the connection down through its owning pool. Idempotent.
    ///
    /// This is a full teardown, not just a clear: the handle is marked
    /// closed, the connection's admission token is released and the pool's
    /// close callback runs on the connection. Errors from the callback are
    /// logged; use [`ConnectionPool::close`] to observe them. When the pool
    /// is already gone the connection is dropped in place.
    pub fn close(&self) {
        let pool = self.state.read().pool.as_ref().and_then(Weak::upgrade);
        match pool {
            Some(shared) => match ConnectionPool::from_shared(shared).close(self) {
                Ok(()) | Err(PoolError::HandleClosed) => {}
                Err(err) => debug!(error = %err, "closing handle failed"),
            },
            None => drop(self.take()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().conn.is_none()
    }

    /// When the connection was created or last returned; `None` once closed
    pub fn last_used(&self) -> Option<Instant> {
        self.state.read().last_used
    }

    /// Release generation the connection belongs to
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// The pool this handle belongs to
    pub fn pool(&self) -> PoolResult<ConnectionPool<T>> {
        self.state
            .read()
            .pool
            .as_ref()
            .and_then(Weak::upgrade)
            .map(ConnectionPool::from_shared)
            .ok_or(PoolError::HandleClosed)
    }

    /// Mark the handle closed and hand back its connection, if any
    pub(crate) fn take(&self) -> Option<(T, u64)> {
        let mut state = self.state.write();
        let conn = state.conn.take()?;
        state.last_used = None;
        state.pool = None;
        Some((conn, state.generation))
    }

    /// Like [`Handle::take`], but only for handles owned by `owner`
    pub(crate) fn detach(&self, owner: &Arc<PoolShared<T>>) -> PoolResult<(T, u64)> {
        let mut state = self.state.write();
        if state.conn.is_none() {
            return Err(PoolError::HandleClosed);
        }
        if !Self::is_owned_by(&state, owner) {
            return Err(PoolError::HandleNil);
        }
        let conn = state.conn.take().ok_or(PoolError::HandleClosed)?;
        state.last_used = None;
        state.pool = None;
        Ok((conn, state.generation))
    }

    /// Run `f` on the connection of a handle owned by `owner`
    pub(crate) fn inspect<R>(&self, owner: &Arc<PoolShared<T>>, f: impl FnOnce(&T) -> R) -> PoolResult<R> {
        let state = self.state.read();
        let conn = state.conn.as_ref().ok_or(PoolError::HandleClosed)?;
        if !Self::is_owned_by(&state, owner) {
            return Err(PoolError::HandleNil);
        }
        Ok(f(conn))
    }

    fn is_owned_by(state: &HandleState<T>, owner: &Arc<PoolShared<T>>) -> bool {
        state
            .pool
            .as_ref()
            .is_some_and(|pool| std::ptr::eq(pool.as_ptr(), Arc::as_ptr(owner)))
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Handle")
            .field("closed", &state.conn.is_none())
            .field("generation", &state.generation)
            .field("last_used", &state.last_used)
            .finish()
    }
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.conn.is_none() {
            return;
        }

        let pool = state.pool.as_ref().and_then(Weak::upgrade);

        match pool {
            Some(shared) => {
                if let Err(err) = ConnectionPool::from_shared(shared).put(self) {
                    debug!(error = %err, "returning dropped handle failed");
                }
            }
            None => trace!("pool is gone, dropping connection in place"),
        }
    }
}
