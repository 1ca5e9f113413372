//! Health monitoring for connection pools

use crate::metrics::PoolMetrics;

/// Health status of a connection pool
///
/// # Examples
///
/// ```
/// use esox_connpool::{ConnectionPool, PoolConfiguration, ResourceHooks};
///
/// let hooks = ResourceHooks::new()
///     .with_factory(|| Ok(0u64))
///     .with_close(|_| Ok(()));
/// let pool = ConnectionPool::new(
///     PoolConfiguration::new().with_initial_cap(3).with_max_cap(3),
///     hooks,
/// ).unwrap();
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.idle_connections, 3);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Live connections as a ratio of the admission limit (0.0 to 1.0)
    pub utilization: f64,

    /// Idle connections count
    pub idle_connections: usize,

    /// Live connections count
    pub live_connections: usize,

    /// Admission limit
    pub max_live: usize,

    /// Whether the pool has been shut down
    pub is_closed: bool,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Derive a health status from a metrics snapshot
    pub fn from_metrics(metrics: &PoolMetrics, is_closed: bool) -> Self {
        let mut warnings = Vec::new();
        let mut is_healthy = !is_closed;

        if is_closed {
            warnings.push("Pool is closed".to_string());
        }

        if metrics.utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", metrics.utilization * 100.0));
            is_healthy = false;
        }

        if !is_closed && metrics.idle_connections == 0 {
            warnings.push("No idle connections".to_string());
        }

        if metrics.factory_failures > 0 {
            warnings.push(format!("Factory failed {} time(s)", metrics.factory_failures));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization: metrics.utilization,
            idle_connections: metrics.idle_connections,
            live_connections: metrics.live_connections,
            max_live: metrics.max_live,
            is_closed,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
