//! Metrics collection and export for connection pools

use crate::eviction::EvictionReason;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics snapshot for a pool
///
/// # Examples
///
/// ```
/// use esox_connpool::{ConnectionPool, PoolConfiguration, ResourceHooks};
///
/// let hooks = ResourceHooks::new()
///     .with_factory(|| Ok(String::from("conn")))
///     .with_close(|_| Ok(()));
/// let pool = ConnectionPool::new(
///     PoolConfiguration::new().with_initial_cap(1).with_max_cap(2),
///     hooks,
/// ).unwrap();
///
/// let conn = pool.get().unwrap();
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_created, 1);
/// assert_eq!(metrics.total_reused, 1);
/// assert_eq!(metrics.live_connections, 1);
/// pool.put(&conn).unwrap();
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Connections opened by the factory
    pub total_created: usize,

    /// Checkouts served from the idle queue
    pub total_reused: usize,

    /// Connections accepted back into the idle queue
    pub total_returned: usize,

    /// Connections torn down through the close callback
    pub total_closed: usize,

    /// Idle connections closed for exceeding the idle timeout
    pub idle_evictions: usize,

    /// Idle connections closed after a failed liveness probe
    pub ping_evictions: usize,

    /// Connections discarded because they predate a release
    pub stale_discards: usize,

    /// Returned connections closed because the idle queue was full
    pub overflow_discards: usize,

    /// Checkouts that timed out waiting for admission
    pub timeouts: usize,

    /// Factory invocations that failed
    pub factory_failures: usize,

    /// Number of releases performed
    pub releases: usize,

    /// Current idle connections
    pub idle_connections: usize,

    /// Current live connections (idle plus checked out)
    pub live_connections: usize,

    /// Maximum number of live connections
    pub max_live: usize,

    /// Live connections as a ratio of `max_live` (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_reused".to_string(), self.total_reused.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("total_closed".to_string(), self.total_closed.to_string());
        metrics.insert("idle_evictions".to_string(), self.idle_evictions.to_string());
        metrics.insert("ping_evictions".to_string(), self.ping_evictions.to_string());
        metrics.insert("stale_discards".to_string(), self.stale_discards.to_string());
        metrics.insert("overflow_discards".to_string(), self.overflow_discards.to_string());
        metrics.insert("timeouts".to_string(), self.timeouts.to_string());
        metrics.insert("factory_failures".to_string(), self.factory_failures.to_string());
        metrics.insert("releases".to_string(), self.releases.to_string());
        metrics.insert("idle_connections".to_string(), self.idle_connections.to_string());
        metrics.insert("live_connections".to_string(), self.live_connections.to_string());
        metrics.insert("max_live".to_string(), self.max_live.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_connpool::{MetricsExporter, PoolMetrics};
    /// use std::collections::HashMap;
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = MetricsExporter::export_prometheus(&PoolMetrics::default(), "db", Some(&tags));
    /// assert!(output.contains("connpool_connections_live"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        // Gauge metrics
        Self::push_metric(&mut output, "connpool_connections_idle", "gauge", "Current idle connections", &labels, metrics.idle_connections.to_string());
        Self::push_metric(&mut output, "connpool_connections_live", "gauge", "Current live connections", &labels, metrics.live_connections.to_string());
        Self::push_metric(&mut output, "connpool_connections_max", "gauge", "Maximum live connections", &labels, metrics.max_live.to_string());
        Self::push_metric(&mut output, "connpool_utilization", "gauge", "Pool utilization ratio", &labels, format!("{:.2}", metrics.utilization));

        // Counter metrics
        Self::push_metric(&mut output, "connpool_connections_created_total", "counter", "Connections opened", &labels, metrics.total_created.to_string());
        Self::push_metric(&mut output, "connpool_connections_reused_total", "counter", "Checkouts served from the idle queue", &labels, metrics.total_reused.to_string());
        Self::push_metric(&mut output, "connpool_connections_returned_total", "counter", "Connections returned to the idle queue", &labels, metrics.total_returned.to_string());
        Self::push_metric(&mut output, "connpool_connections_closed_total", "counter", "Connections closed", &labels, metrics.total_closed.to_string());
        Self::push_metric(&mut output, "connpool_evictions_idle_total", "counter", "Idle timeout evictions", &labels, metrics.idle_evictions.to_string());
        Self::push_metric(&mut output, "connpool_evictions_ping_total", "counter", "Liveness probe evictions", &labels, metrics.ping_evictions.to_string());
        Self::push_metric(&mut output, "connpool_discards_stale_total", "counter", "Connections discarded after a release", &labels, metrics.stale_discards.to_string());
        Self::push_metric(&mut output, "connpool_discards_overflow_total", "counter", "Returns discarded on a full idle queue", &labels, metrics.overflow_discards.to_string());
        Self::push_metric(&mut output, "connpool_timeouts_total", "counter", "Checkouts that timed out", &labels, metrics.timeouts.to_string());
        Self::push_metric(&mut output, "connpool_factory_failures_total", "counter", "Failed factory invocations", &labels, metrics.factory_failures.to_string());
        Self::push_metric(&mut output, "connpool_releases_total", "counter", "Pool releases", &labels, metrics.releases.to_string());

        output
    }

    fn push_metric(output: &mut String, name: &str, kind: &str, help: &str, labels: &str, value: String) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} {}\n", name, kind));
        output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut tags: Vec<_> = tags.iter().collect();
            tags.sort();
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_created: AtomicUsize,
    pub total_reused: AtomicUsize,
    pub total_returned: AtomicUsize,
    pub total_closed: AtomicUsize,
    pub idle_evictions: AtomicUsize,
    pub ping_evictions: AtomicUsize,
    pub stale_discards: AtomicUsize,
    pub overflow_discards: AtomicUsize,
    pub timeouts: AtomicUsize,
    pub factory_failures: AtomicUsize,
    pub releases: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self, reason: EvictionReason) {
        let counter = match reason {
            EvictionReason::Stale => &self.stale_discards,
            EvictionReason::IdleTimeout => &self.idle_evictions,
            EvictionReason::PingFailed => &self.ping_evictions,
        };
        Self::incr(counter);
    }

    pub fn get_metrics(&self, idle: usize, live: usize, max_live: usize) -> PoolMetrics {
        let utilization = if max_live > 0 {
            live as f64 / max_live as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_created: self.total_created.load(Ordering::Relaxed),
            total_reused: self.total_reused.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            total_closed: self.total_closed.load(Ordering::Relaxed),
            idle_evictions: self.idle_evictions.load(Ordering::Relaxed),
            ping_evictions: self.ping_evictions.load(Ordering::Relaxed),
            stale_discards: self.stale_discards.load(Ordering::Relaxed),
            overflow_discards: self.overflow_discards.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            factory_failures: self.factory_failures.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            idle_connections: idle,
            live_connections: live,
            max_live,
            utilization,
        }
    }
}
