//! # EsoxSolutions.ConnectionPool (Rust)
//!
//! Bounded, thread-safe pool for expensive, reusable connections that are
//! opened and closed through caller-supplied callbacks.
//!
//! ## Features
//!
//! - Bounded idle queue with non-blocking return
//! - Separate admission semaphore capping live connections at
//!   `concurrent_base * max_cap`
//! - Lazy eviction on checkout: idle timeout and optional liveness probe
//! - Generation-based release: connections opened before a release never
//!   re-enter the pool
//! - Automatic return of handles via RAII (Drop trait)
//! - Async checkout on the tokio blocking pool
//! - Health monitoring and metrics, with Prometheus text export
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_connpool::{ConnectionPool, PoolConfiguration, ResourceHooks};
//!
//! let hooks = ResourceHooks::new()
//!     .with_factory(|| Ok(String::from("connection")))
//!     .with_close(|_conn| Ok(()));
//!
//! let pool = ConnectionPool::new(PoolConfiguration::new().with_max_cap(4), hooks).unwrap();
//! {
//!     let conn = pool.get().unwrap();
//!     println!("Got: {}", *conn.get().unwrap());
//!     // Connection automatically returned when `conn` goes out of scope
//! }
//! assert_eq!(pool.len(), 1);
//! ```

mod admission;
mod pool;
mod handle;
mod config;
mod hooks;
mod metrics;
mod health;
mod eviction;
mod errors;

pub use pool::ConnectionPool;
pub use handle::Handle;
pub use config::{PoolConfiguration, DEFAULT_CONCURRENT_BASE, DEFAULT_IDLE_CHECK_FREQUENCY, DEFAULT_POOL_TIMEOUT};
pub use hooks::ResourceHooks;
pub use metrics::{PoolMetrics, MetricsExporter};
pub use health::HealthStatus;
pub use eviction::{EvictionPolicy, EvictionReason};
pub use errors::{BoxError, PoolError, PoolResult, SharedError};
