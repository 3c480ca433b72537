//! Member status and the locally recorded state around it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a member as seen by the local view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Responding normally.
    Alive,

    /// Missed a probe; fails unless refuted before the fail timeout.
    Suspicious,

    /// Confirmed dead. Kept in the view so the finding keeps spreading.
    Failed,

    /// Tombstone, removed on the next cleanup.
    Delete,

    /// Departed voluntarily. Kept in the view until the leave timeout.
    Left,
}

impl Status {
    /// Whether gossip is forbidden from downgrading this status once it is
    /// held locally.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Delete | Self::Left)
    }

    /// Whether an unknown member reported with this status may be added to
    /// the view.
    #[must_use]
    pub const fn is_admissible(self) -> bool {
        matches!(self, Self::Alive | Self::Suspicious)
    }

    /// Variant name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alive => "Alive",
            Self::Suspicious => "Suspicious",
            Self::Failed => "Failed",
            Self::Delete => "Delete",
            Self::Left => "Left",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status together with the instant this process decided it.
///
/// `last_transition` is local bookkeeping, not a remote heartbeat: merges
/// overwrite it with the local clock whenever they change the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberState {
    /// Current status.
    pub status: Status,

    /// When `status` last changed in this view.
    pub last_transition: DateTime<Utc>,
}

impl MemberState {
    /// State with the given status, transitioned now.
    #[must_use]
    pub fn now(status: Status) -> Self {
        Self::at(status, Utc::now())
    }

    /// State with the given status and transition time.
    #[must_use]
    pub const fn at(status: Status, last_transition: DateTime<Utc>) -> Self {
        Self {
            status,
            last_transition,
        }
    }

    /// Move to `status`, stamping the transition at `now`.
    pub fn transition(&mut self, status: Status, now: DateTime<Utc>) {
        self.status = status;
        self.last_transition = now;
    }

    /// Whole seconds elapsed between the last transition and `now`.
    #[must_use]
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_transition).num_seconds()
    }
}

impl fmt::Display for MemberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.status, self.last_transition)
    }
}
