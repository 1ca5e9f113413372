//! Checkout-time eviction policy

use std::fmt;
use std::time::{Duration, Instant};

/// Eviction policy applied to idle connections when they are checked out
///
/// There is no background reaper: a connection is only inspected when a
/// caller pops it from the idle queue.
///
/// # Examples
///
/// ```
/// use esox_connpool::EvictionPolicy;
/// use std::time::{Duration, Instant};
///
/// let policy = EvictionPolicy::from_idle_timeout(Some(Duration::from_secs(60)));
/// assert!(!policy.is_idle_expired(Instant::now()));
///
/// assert_eq!(EvictionPolicy::from_idle_timeout(None), EvictionPolicy::None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// No idle eviction
    #[default]
    None,

    /// Connections idle for longer than the duration are closed on checkout
    IdleTimeout(Duration),
}

impl EvictionPolicy {
    /// Build the policy from an optional idle timeout; zero disables eviction
    pub fn from_idle_timeout(timeout: Option<Duration>) -> Self {
        match timeout {
            Some(timeout) if !timeout.is_zero() => EvictionPolicy::IdleTimeout(timeout),
            _ => EvictionPolicy::None,
        }
    }

    /// Whether a connection last used at `last_used` has been idle too long
    pub fn is_idle_expired(&self, last_used: Instant) -> bool {
        match self {
            EvictionPolicy::None => false,
            EvictionPolicy::IdleTimeout(timeout) => last_used.elapsed() > *timeout,
        }
    }
}

/// Why an idle connection was discarded at checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Created before the most recent release
    Stale,

    /// Idle for longer than the configured timeout
    IdleTimeout,

    /// The liveness probe failed
    PingFailed,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            EvictionReason::Stale => "stale generation",
            EvictionReason::IdleTimeout => "idle timeout",
            EvictionReason::PingFailed => "ping failed",
        };
        f.write_str(reason)
    }
}
