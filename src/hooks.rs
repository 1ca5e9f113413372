//! Caller-supplied lifecycle callbacks

use crate::errors::{BoxError, PoolError, PoolResult};
use std::fmt;

type FactoryFn<T> = Box<dyn Fn() -> Result<T, BoxError> + Send + Sync>;
type CloseFn<T> = Box<dyn Fn(T) -> Result<(), BoxError> + Send + Sync>;
type PingFn<T> = Box<dyn Fn(&T) -> Result<(), BoxError> + Send + Sync>;

/// Callbacks that create, tear down and probe pooled connections
///
/// The hooks are handed to the pool once and never change afterwards.
///
/// # Examples
///
/// ```
/// use esox_connpool::ResourceHooks;
///
/// let hooks = ResourceHooks::<u32>::new()
///     .with_factory(|| Ok(7))
///     .with_close(|_conn| Ok(()))
///     .with_ping(|conn| if *conn == 7 { Ok(()) } else { Err("bad".into()) });
///
/// assert!(hooks.validate().is_ok());
/// assert!(hooks.has_ping());
/// ```
pub struct ResourceHooks<T> {
    factory: Option<FactoryFn<T>>,
    close: Option<CloseFn<T>>,
    ping: Option<PingFn<T>>,
}

impl<T> Default for ResourceHooks<T> {
    fn default() -> Self {
        Self {
            factory: None,
            close: None,
            ping: None,
        }
    }
}

impl<T> fmt::Debug for ResourceHooks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHooks")
            .field("factory", &self.factory.is_some())
            .field("close", &self.close.is_some())
            .field("ping", &self.ping.is_some())
            .finish()
    }
}

impl<T> ResourceHooks<T> {
    /// Create an empty set of hooks
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the function that opens a new connection
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Set the function that tears a connection down
    pub fn with_close<F>(mut self, close: F) -> Self
    where
        F: Fn(T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.close = Some(Box::new(close));
        self
    }

    /// Set the liveness probe run on checkout
    pub fn with_ping<F>(mut self, ping: F) -> Self
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.ping = Some(Box::new(ping));
        self
    }

    /// Whether a liveness probe is configured
    pub fn has_ping(&self) -> bool {
        self.ping.is_some()
    }

    /// Check that the required callbacks are present
    pub fn validate(&self) -> PoolResult<()> {
        if self.factory.is_none() {
            return Err(PoolError::InvalidConfig(
                "factory callback is required".to_string(),
            ));
        }
        if self.close.is_none() {
            return Err(PoolError::InvalidConfig(
                "close callback is required".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn create(&self) -> PoolResult<T> {
        let factory = self.factory.as_ref().ok_or_else(|| {
            PoolError::InvalidConfig("factory callback is required".to_string())
        })?;
        factory().map_err(PoolError::generate_failed)
    }

    pub(crate) fn destroy(&self, conn: T) -> PoolResult<()> {
        match self.close.as_ref() {
            Some(close) => close(conn).map_err(PoolError::close_failed),
            None => {
                drop(conn);
                Ok(())
            }
        }
    }

    /// `Ok` when no probe is configured
    pub(crate) fn probe(&self, conn: &T) -> PoolResult<()> {
        match self.ping.as_ref() {
            Some(ping) => ping(conn).map_err(PoolError::ping_failed),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_missing_factory_is_invalid() {
        let hooks = ResourceHooks::<u8>::new().with_close(|_| Ok(()));
        assert!(matches!(hooks.validate(), Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_close_is_invalid() {
        let hooks = ResourceHooks::<u8>::new().with_factory(|| Ok(1));
        assert!(matches!(hooks.validate(), Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_create_wraps_factory_error() {
        let hooks = ResourceHooks::<u8>::new()
            .with_factory(|| Err("connection refused".into()))
            .with_close(|_| Ok(()));

        match hooks.create() {
            Err(PoolError::GenerateFailed(source)) => {
                assert_eq!(source.to_string(), "connection refused")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_destroy_invokes_close() {
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closed);
        let hooks = ResourceHooks::<u8>::new()
            .with_factory(|| Ok(1))
            .with_close(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });

        hooks.destroy(1).unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_probe_without_ping_is_healthy() {
        let hooks = ResourceHooks::<u8>::new();
        assert!(hooks.probe(&0).is_ok());
        assert!(!hooks.has_ping());
    }
}
