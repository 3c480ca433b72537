//! Runtime configuration of the membership core.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::aging::AgingPolicy;

/// Default time a member may stay suspicious before it is declared failed.
pub const DEFAULT_T_FAIL: Duration = Duration::from_secs(1);

/// Default time a failed member is kept before it becomes a tombstone.
pub const DEFAULT_T_DELETE: Duration = Duration::from_secs(1);

/// Default time a departed member is kept before it becomes a tombstone.
pub const DEFAULT_T_LEAVE: Duration = Duration::from_secs(2);

/// Default period of the aging monitor.
pub const DEFAULT_AGE_INTERVAL: Duration = Duration::from_secs(1);

/// Default loopback port of the subsystem receiving failure notices.
pub const DEFAULT_NOTIFY_PORT: u16 = 7200;

/// Configuration for the membership core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipConfig {
    /// Suspicious to Failed threshold
    pub t_fail: Duration,

    /// Failed to Delete threshold
    pub t_delete: Duration,

    /// Left to Delete threshold
    pub t_leave: Duration,

    /// How often the aging monitor runs
    pub age_interval: Duration,

    /// Where failure notices are sent
    pub notify_addr: SocketAddr,

    /// Drop tombstones right after each aging pass
    pub cleanup_after_age: bool,
}

impl MembershipConfig {
    /// Thresholds for the aging monitor.
    #[must_use]
    pub const fn aging_policy(&self) -> AgingPolicy {
        AgingPolicy {
            t_fail: self.t_fail,
            t_delete: self.t_delete,
            t_leave: self.t_leave,
        }
    }
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            t_fail: DEFAULT_T_FAIL,
            t_delete: DEFAULT_T_DELETE,
            t_leave: DEFAULT_T_LEAVE,
            age_interval: DEFAULT_AGE_INTERVAL,
            notify_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_NOTIFY_PORT)),
            cleanup_after_age: true,
        }
    }
}
