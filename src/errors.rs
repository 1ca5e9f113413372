//! Error types for the connection pool

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed error produced by a caller-supplied callback
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Shared error source, kept behind an `Arc` so `PoolError` stays `Clone`
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Timed out after {0:?} waiting for a connection")]
    Timeout(Duration),

    #[error("Handle is closed")]
    HandleClosed,

    #[error("Handle is not attached to a pool")]
    HandleNil,

    #[error("Connection generation failed: {0}")]
    GenerateFailed(#[source] SharedError),

    #[error("Factory is not able to fill the pool: {0}")]
    FillFailed(#[source] Arc<PoolError>),

    #[error("Closing connection failed: {0}")]
    CloseFailed(#[source] SharedError),

    #[error("Connection liveness check failed: {0}")]
    PingFailed(#[source] SharedError),

    #[error("Operation was cancelled")]
    Cancelled,
}

impl PoolError {
    pub(crate) fn generate_failed(err: BoxError) -> Self {
        PoolError::GenerateFailed(Arc::from(err))
    }

    pub(crate) fn close_failed(err: BoxError) -> Self {
        PoolError::CloseFailed(Arc::from(err))
    }

    pub(crate) fn ping_failed(err: BoxError) -> Self {
        PoolError::PingFailed(Arc::from(err))
    }

    /// Whether retrying the same operation later may succeed
    ///
    /// Only a checkout timeout qualifies; factory failures are surfaced as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::Timeout(_))
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
