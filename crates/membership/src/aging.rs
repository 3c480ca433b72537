//! Time-driven status promotion.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::member::Member;
use crate::status::Status;

/// Thresholds after which a status ages into the next one.
///
/// Elapsed time is measured in whole seconds, so thresholds are rounded up
/// to the next whole second: `500ms` behaves like `1s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgingPolicy {
    /// Time a member stays `Suspicious` before it is declared `Failed`.
    pub t_fail: Duration,

    /// Time a member stays `Failed` before it becomes a `Delete` tombstone.
    pub t_delete: Duration,

    /// Time a member stays `Left` before it becomes a `Delete` tombstone.
    pub t_leave: Duration,
}

impl AgingPolicy {
    /// Status `status` ages into after the returned threshold, if it ages
    /// at all.
    const fn next(&self, status: Status) -> Option<(Status, Duration)> {
        match status {
            Status::Suspicious => Some((Status::Failed, self.t_fail)),
            Status::Failed => Some((Status::Delete, self.t_delete)),
            Status::Left => Some((Status::Delete, self.t_leave)),
            Status::Alive | Status::Delete => None,
        }
    }
}

/// Age every member by one step at most, as of `now`.
///
/// Returns the ids that went from `Suspicious` to `Failed`; those are the
/// members a failure notice must be sent for.
pub fn age_members(
    members: &mut [Member],
    policy: &AgingPolicy,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut failed = Vec::new();

    for member in members.iter_mut() {
        let Some((next, threshold)) = policy.next(member.status()) else {
            continue;
        };

        let elapsed = member.state().elapsed_secs(now);
        if !threshold_reached(elapsed, threshold) {
            continue;
        }

        member.state_mut().transition(next, now);
        if next == Status::Failed {
            failed.push(member.id().to_string());
        }
    }

    failed
}

/// Thresholds compare in whole seconds, rounded up.
fn threshold_reached(elapsed_secs: i64, threshold: Duration) -> bool {
    let threshold_secs = threshold.as_secs() + u64::from(threshold.subsec_nanos() > 0);
    u64::try_from(elapsed_secs).is_ok_and(|elapsed| elapsed >= threshold_secs)
}
