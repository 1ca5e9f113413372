//! Pool configuration options

use crate::errors::{PoolError, PoolResult};
use std::time::Duration;

/// Default time a checkout waits for an admission token
pub const DEFAULT_POOL_TIMEOUT: Duration = Duration::from_secs(1);

/// Default admission multiplier applied to `max_cap`
pub const DEFAULT_CONCURRENT_BASE: usize = 2;

/// Default value of the reserved idle check frequency
pub const DEFAULT_IDLE_CHECK_FREQUENCY: Duration = Duration::from_secs(30 * 60);

/// Configuration for connection pool behavior
///
/// # Examples
///
/// ```
/// use esox_connpool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_initial_cap(2)
///     .with_max_cap(8)
///     .with_concurrent_base(3)
///     .with_idle_timeout(Duration::from_secs(30))
///     .with_pool_timeout(Duration::from_millis(250));
///
/// assert_eq!(config.max_cap, 8);
/// assert_eq!(config.max_live(), 24);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration {
    /// Number of connections created eagerly on construction
    pub initial_cap: usize,

    /// Capacity of the idle queue
    pub max_cap: usize,

    /// Admission multiplier: at most `concurrent_base * max_cap` connections are live.
    /// Zero selects the default of 2.
    pub concurrent_base: usize,

    /// Connections idle for longer than this are closed on checkout.
    /// `None` or zero disables idle eviction.
    pub idle_timeout: Option<Duration>,

    /// How long a checkout may wait for an admission token. Zero selects one second.
    pub pool_timeout: Duration,

    /// Reserved; eviction happens on checkout and never on a timer.
    pub idle_check_frequency: Duration,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            initial_cap: 0,
            max_cap: 10,
            concurrent_base: DEFAULT_CONCURRENT_BASE,
            idle_timeout: None,
            pool_timeout: DEFAULT_POOL_TIMEOUT,
            idle_check_frequency: DEFAULT_IDLE_CHECK_FREQUENCY,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of connections created on construction
    pub fn with_initial_cap(mut self, initial_cap: usize) -> Self {
        self.initial_cap = initial_cap;
        self
    }

    /// Set the idle queue capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_connpool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new().with_max_cap(50);
    ///
    /// assert_eq!(config.max_cap, 50);
    /// ```
    pub fn with_max_cap(mut self, max_cap: usize) -> Self {
        self.max_cap = max_cap;
        self
    }

    /// Set the admission multiplier
    pub fn with_concurrent_base(mut self, concurrent_base: usize) -> Self {
        self.concurrent_base = concurrent_base;
        self
    }

    /// Set the idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the checkout timeout
    pub fn with_pool_timeout(mut self, timeout: Duration) -> Self {
        self.pool_timeout = timeout;
        self
    }

    /// Set the reserved idle check frequency
    pub fn with_idle_check_frequency(mut self, frequency: Duration) -> Self {
        self.idle_check_frequency = frequency;
        self
    }

    /// Check capacity bounds
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_cap == 0 {
            return Err(PoolError::InvalidConfig(
                "max_cap must be greater than zero".to_string(),
            ));
        }
        if self.initial_cap > self.max_cap {
            return Err(PoolError::InvalidConfig(format!(
                "initial_cap ({}) must not exceed max_cap ({})",
                self.initial_cap, self.max_cap
            )));
        }
        Ok(())
    }

    /// Effective admission multiplier
    pub fn effective_concurrent_base(&self) -> usize {
        if self.concurrent_base == 0 {
            DEFAULT_CONCURRENT_BASE
        } else {
            self.concurrent_base
        }
    }

    /// Effective checkout timeout
    pub fn effective_pool_timeout(&self) -> Duration {
        if self.pool_timeout.is_zero() {
            DEFAULT_POOL_TIMEOUT
        } else {
            self.pool_timeout
        }
    }

    /// Maximum number of simultaneously live connections
    pub fn max_live(&self) -> usize {
        self.effective_concurrent_base().saturating_mul(self.max_cap)
    }

    /// Copy with defaults applied to zeroed fields
    pub(crate) fn normalized(mut self) -> Self {
        self.concurrent_base = self.effective_concurrent_base();
        self.pool_timeout = self.effective_pool_timeout();
        if self.idle_check_frequency.is_zero() {
            self.idle_check_frequency = DEFAULT_IDLE_CHECK_FREQUENCY;
        }
        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            self.idle_timeout = None;
        }
        self
    }
}
