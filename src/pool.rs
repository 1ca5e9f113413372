//! Core connection pool implementation

use crate::admission::{Admission, Admit, deadline_after};
use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::eviction::{EvictionPolicy, EvictionReason};
use crate::handle::Handle;
use crate::health::HealthStatus;
use crate::hooks::ResourceHooks;
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};

use crossbeam::queue::ArrayQueue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// State shared between a pool and the handles it hands out
pub(crate) struct PoolShared<T> {
    /// `None` once the pool has been shut down
    idle: RwLock<Option<ArrayQueue<Handle<T>>>>,
    admission: Admission,
    /// Advanced by every release, only while `idle` is write-locked
    generation: AtomicU64,
    eviction: EvictionPolicy,
    metrics: MetricsTracker,
    hooks: ResourceHooks<T>,
    config: PoolConfiguration,
}

impl<T> Drop for PoolShared<T> {
    fn drop(&mut self) {
        let Some(queue) = self.idle.get_mut().take() else {
            return;
        };
        while let Some(handle) = queue.pop() {
            if let Some((conn, _)) = handle.take() {
                if let Err(err) = self.hooks.destroy(conn) {
                    warn!(error = %err, "closing idle connection on pool drop failed");
                }
            }
        }
    }
}

/// Bounded pool of reusable connections
///
/// Idle connections sit in a queue of `max_cap` slots. Independently, an
/// admission semaphore of `concurrent_base * max_cap` tokens bounds how many
/// connections may be alive at once, idle or checked out. Every live
/// connection holds exactly one token until it is closed.
///
/// Cloning the pool is cheap; clones share the same state.
///
/// # Examples
///
/// ```
/// use esox_connpool::{ConnectionPool, PoolConfiguration, ResourceHooks};
///
/// let hooks = ResourceHooks::new()
///     .with_factory(|| Ok(vec![0u8; 16]))
///     .with_close(|_buf| Ok(()));
///
/// let pool = ConnectionPool::new(
///     PoolConfiguration::new().with_initial_cap(1).with_max_cap(4),
///     hooks,
/// ).unwrap();
/// assert_eq!(pool.len(), 1);
///
/// let conn = pool.get().unwrap();
/// assert_eq!(conn.get().unwrap().len(), 16);
/// assert_eq!(pool.len(), 0);
///
/// pool.put(&conn).unwrap();
/// assert_eq!(pool.len(), 1);
/// assert!(conn.is_closed());
/// ```
pub struct ConnectionPool<T> {
    shared: Arc<PoolShared<T>>,
}

impl<T> Clone for ConnectionPool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for ConnectionPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("idle", &self.len())
            .field("live", &self.live_count())
            .field("max_live", &self.max_live())
            .field("generation", &self.generation())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> ConnectionPool<T> {
    /// Create a pool and eagerly open `initial_cap` connections
    ///
    /// Fails with [`PoolError::InvalidConfig`] on bad capacities or missing
    /// callbacks, and with [`PoolError::FillFailed`] if the factory fails while
    /// filling; connections opened up to that point are closed again.
    pub fn new(config: PoolConfiguration, hooks: ResourceHooks<T>) -> PoolResult<Self> {
        config.validate()?;
        hooks.validate()?;
        let config = config.normalized();

        let pool = Self {
            shared: Arc::new(PoolShared {
                idle: RwLock::new(Some(ArrayQueue::new(config.max_cap))),
                admission: Admission::new(config.max_live()),
                generation: AtomicU64::new(0),
                eviction: EvictionPolicy::from_idle_timeout(config.idle_timeout),
                metrics: MetricsTracker::new(),
                hooks,
                config,
            }),
        };

        for _ in 0..pool.shared.config.initial_cap {
            let handle = match pool.generate() {
                Ok(handle) => handle,
                Err(err) => {
                    pool.release();
                    return Err(PoolError::FillFailed(Arc::new(err)));
                }
            };
            pool.push_idle(handle)?;
        }

        debug!(
            initial_cap = pool.shared.config.initial_cap,
            max_cap = pool.shared.config.max_cap,
            max_live = pool.max_live(),
            "connection pool created"
        );
        Ok(pool)
    }

    pub(crate) fn from_shared(shared: Arc<PoolShared<T>>) -> Self {
        Self { shared }
    }

    /// Check out a connection
    ///
    /// An idle connection is reused when one is available and still usable;
    /// one that is stale, idle for too long or fails the liveness probe is
    /// closed and replaced by a new one. When the pool is saturated, waits up
    /// to the pool timeout for either a returned idle connection or a free
    /// admission token, whichever comes first.
    pub fn get(&self) -> PoolResult<Handle<T>> {
        let timeout = self.shared.config.pool_timeout;
        let deadline = deadline_after(timeout);

        loop {
            let seen = self.shared.admission.returns();
            let generation = self.generation();
            if let Some(handle) = self.pop_idle()? {
                return Ok(handle);
            }

            match self.shared.admission.acquire_or_returned(deadline, seen) {
                Admit::Token => return self.open(generation),
                Admit::Returned => trace!("connection returned while waiting, retrying idle queue"),
                Admit::TimedOut => return Err(self.timed_out(timeout)),
            }
        }
    }

    /// Check out a connection without blocking the async runtime
    pub async fn get_async(&self) -> PoolResult<Handle<T>>
    where
        T: Send + Sync + 'static,
    {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || pool.get())
            .await
            .map_err(|_| PoolError::Cancelled)?
    }

    /// Return a connection to the idle queue
    ///
    /// Never blocks. The connection is closed instead of queued when the pool
    /// has been shut down, when it was opened before the latest
    /// [`release`](Self::release), or when the idle queue is full.
    pub fn put(&self, handle: &Handle<T>) -> PoolResult<()> {
        let idle = self.shared.idle.read();
        let Some(queue) = idle.as_ref() else {
            drop(idle);
            return self.close(handle);
        };

        let (conn, generation) = handle.detach(&self.shared)?;
        if generation != self.shared.generation.load(Ordering::SeqCst) {
            drop(idle);
            MetricsTracker::incr(&self.shared.metrics.stale_discards);
            debug!(generation, "discarding connection from a released generation");
            return self.destroy(conn);
        }

        match queue.push(Handle::new(conn, generation, Arc::downgrade(&self.shared))) {
            Ok(()) => {
                drop(idle);
                MetricsTracker::incr(&self.shared.metrics.total_returned);
                self.shared.admission.announce_return();
                Ok(())
            }
            Err(rejected) => {
                drop(idle);
                MetricsTracker::incr(&self.shared.metrics.overflow_discards);
                trace!("idle queue is full, closing returned connection");
                self.close(&rejected)
            }
        }
    }

    /// Close a single connection and free its admission token
    pub fn close(&self, handle: &Handle<T>) -> PoolResult<()> {
        let (conn, _) = handle.detach(&self.shared)?;
        self.destroy(conn)
    }

    /// Run the liveness probe on a connection; `Ok` when none is configured
    pub fn ping(&self, handle: &Handle<T>) -> PoolResult<()> {
        if !self.shared.hooks.has_ping() {
            return Ok(());
        }
        handle.inspect(&self.shared, |conn| self.shared.hooks.probe(conn))?
    }

    /// Close every idle connection and start a new generation
    ///
    /// Connections checked out before the release stay usable, but are closed
    /// rather than queued when they are returned. The pool itself keeps
    /// serving requests. Has no effect on a pool that has been shut down.
    pub fn release(&self) {
        let old = {
            let mut idle = self.shared.idle.write();
            let Some(queue) = idle.as_mut() else {
                return;
            };
            let old = std::mem::replace(queue, ArrayQueue::new(self.shared.config.max_cap));
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            old
        };

        MetricsTracker::incr(&self.shared.metrics.releases);
        debug!(idle = old.len(), generation = self.generation(), "releasing idle connections");
        self.drain(old);
    }

    /// Close every idle connection and stop serving
    ///
    /// Afterwards [`get`](Self::get) fails with [`PoolError::PoolClosed`] and
    /// returned connections are closed. Idempotent.
    pub fn shutdown(&self) {
        let old = {
            let mut idle = self.shared.idle.write();
            let old = idle.take();
            if old.is_some() {
                self.shared.generation.fetch_add(1, Ordering::SeqCst);
            }
            old
        };

        if let Some(old) = old {
            debug!(idle = old.len(), "shutting down connection pool");
            self.drain(old);
        }
    }

    /// Number of idle connections
    pub fn len(&self) -> usize {
        self.shared.idle.read().as_ref().map_or(0, ArrayQueue::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live connections, idle or checked out
    pub fn live_count(&self) -> usize {
        self.shared.admission.in_use()
    }

    /// Idle queue capacity
    pub fn capacity(&self) -> usize {
        self.shared.config.max_cap
    }

    /// Maximum number of simultaneously live connections
    pub fn max_live(&self) -> usize {
        self.shared.admission.capacity()
    }

    /// Current release generation
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.idle.read().is_none()
    }

    /// Effective configuration, with defaults applied
    pub fn config(&self) -> &PoolConfiguration {
        &self.shared.config
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        HealthStatus::from_metrics(&self.get_metrics(), self.is_closed())
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        self.shared
            .metrics
            .get_metrics(self.len(), self.live_count(), self.max_live())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    /// Open a connection under a fresh admission token
    fn generate(&self) -> PoolResult<Handle<T>> {
        let timeout = self.shared.config.pool_timeout;
        let generation = self.generation();
        if !self.shared.admission.acquire(timeout) {
            return Err(self.timed_out(timeout));
        }
        self.open(generation)
    }

    /// Run the factory under an already acquired token
    ///
    /// `generation` is read before waiting for the token, so a release that
    /// happens while the factory runs also covers the new connection.
    fn open(&self, generation: u64) -> PoolResult<Handle<T>> {
        match self.shared.hooks.create() {
            Ok(conn) => {
                MetricsTracker::incr(&self.shared.metrics.total_created);
                Ok(Handle::new(conn, generation, Arc::downgrade(&self.shared)))
            }
            Err(err) => {
                self.shared.admission.release();
                MetricsTracker::incr(&self.shared.metrics.factory_failures);
                warn!(error = %err, "connection factory failed");
                Err(err)
            }
        }
    }

    fn timed_out(&self, timeout: Duration) -> PoolError {
        MetricsTracker::incr(&self.shared.metrics.timeouts);
        debug!(?timeout, "timed out waiting for a connection");
        PoolError::Timeout(timeout)
    }

    /// Pop one idle connection; an unusable one is closed and `None` returned
    fn pop_idle(&self) -> PoolResult<Option<Handle<T>>> {
        let popped = {
            let idle = self.shared.idle.read();
            let queue = idle.as_ref().ok_or(PoolError::PoolClosed)?;
            queue.pop().map(|handle| {
                let stale = handle.generation() != self.shared.generation.load(Ordering::SeqCst);
                (handle, stale)
            })
        };

        let Some((handle, stale)) = popped else {
            return Ok(None);
        };
        match self.check_idle(&handle, stale) {
            None => {
                MetricsTracker::incr(&self.shared.metrics.total_reused);
                trace!("reusing idle connection");
                Ok(Some(handle))
            }
            Some(reason) => {
                self.shared.metrics.record_eviction(reason);
                debug!(%reason, "evicting idle connection");
                if let Err(err) = self.close(&handle) {
                    warn!(error = %err, "closing evicted connection failed");
                }
                Ok(None)
            }
        }
    }

    /// Free the admission token first, then run the close callback
    fn destroy(&self, conn: T) -> PoolResult<()> {
        self.shared.admission.release();
        MetricsTracker::incr(&self.shared.metrics.total_closed);
        self.shared.hooks.destroy(conn)
    }

    fn check_idle(&self, handle: &Handle<T>, stale: bool) -> Option<EvictionReason> {
        if stale {
            return Some(EvictionReason::Stale);
        }
        if let Some(last_used) = handle.last_used()
            && self.shared.eviction.is_idle_expired(last_used)
        {
            return Some(EvictionReason::IdleTimeout);
        }
        if self.ping(handle).is_err() {
            return Some(EvictionReason::PingFailed);
        }
        None
    }

    fn push_idle(&self, handle: Handle<T>) -> PoolResult<()> {
        let rejected = {
            let idle = self.shared.idle.read();
            let queue = idle.as_ref().ok_or(PoolError::PoolClosed)?;
            queue.push(handle).err()
        };
        match rejected {
            Some(handle) => self.close(&handle),
            None => Ok(()),
        }
    }

    fn drain(&self, queue: ArrayQueue<Handle<T>>) {
        while let Some(handle) = queue.pop() {
            if let Err(err) = self.close(&handle) {
                warn!(error = %err, "closing released connection failed");
            }
        }
    }
}
