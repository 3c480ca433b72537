//! The lock-guarded membership view shared by every component of a member
//! process.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::aging::{AgingPolicy, age_members};
use crate::member::Member;
use crate::merge::{MergeOutcome, merge_members};
use crate::status::Status;

/// Ordered list of known members behind a single reader/writer lock.
///
/// Mutations take the lock exclusively for their whole duration; reads take
/// it shared and hand out owned copies, never references into the list.
/// Lookups by id that find nothing are no-ops reported through the return
/// value.
#[derive(Debug, Default)]
pub struct MembershipView {
    members: RwLock<Vec<Member>>,
}

impl MembershipView {
    /// Empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// View seeded with `members`.
    #[must_use]
    pub fn with_members(members: Vec<Member>) -> Self {
        Self {
            members: RwLock::new(members),
        }
    }

    /// Append `member` at the end and return its index.
    ///
    /// There is no duplicate-id check; callers must not add a member twice.
    pub fn append(&self, member: Member) -> usize {
        let mut members = self.members.write();
        debug!("Appending {} to membership view", member);
        members.push(member);
        members.len() - 1
    }

    /// Number of records, tombstones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    /// Whether the view holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Owned copy of every record, in view order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Member> {
        self.members.read().clone()
    }

    /// Owned copy of the record with `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Member> {
        self.members.read().iter().find(|m| m.id() == id).cloned()
    }

    /// Increment the incarnation of our own record to refute rumors about
    /// us. Returns `false` if `my_id` is not in the view or its incarnation
    /// is already `u64::MAX`.
    pub fn bump_self_incarnation(&self, my_id: &str) -> bool {
        let mut members = self.members.write();
        let Some(me) = members.iter_mut().find(|m| m.id() == my_id) else {
            warn!("Own record {} not found, incarnation not bumped", my_id);
            return false;
        };

        let Some(incarnation) = me.incarnation().checked_add(1) else {
            warn!("Own ({}) incarnation is exhausted, not bumped", my_id);
            return false;
        };
        me.set_incarnation(incarnation);
        info!("Bumped own ({}) incarnation to {}", my_id, incarnation);
        true
    }

    /// Mark `id` suspicious. Only an `Alive` record changes; anything else
    /// already carries an equal or stronger finding and keeps its timestamp.
    pub fn mark_suspicious(&self, id: &str) -> bool {
        self.mark_suspicious_at(id, Utc::now())
    }

    pub(crate) fn mark_suspicious_at(&self, id: &str, now: DateTime<Utc>) -> bool {
        let mut members = self.members.write();
        match members.iter_mut().find(|m| m.id() == id) {
            Some(member) if member.status() == Status::Alive => {
                member.state_mut().transition(Status::Suspicious, now);
                info!("Marked {} suspicious", id);
                true
            }
            Some(member) => {
                debug!("Not marking {} suspicious, already {}", id, member.status());
                false
            }
            None => false,
        }
    }

    /// Mark `id` as having left, whatever its current status. Returns
    /// `false` if `id` is not in the view.
    pub fn mark_left(&self, id: &str) -> bool {
        let mut members = self.members.write();
        let Some(member) = members.iter_mut().find(|m| m.id() == id) else {
            return false;
        };

        member.state_mut().transition(Status::Left, Utc::now());
        info!("Marked {} as left", id);
        true
    }

    /// Drop every `Delete` tombstone, keeping the others in order. Returns
    /// how many records were removed.
    pub fn cleanup(&self) -> usize {
        let mut members = self.members.write();
        let before = members.len();
        members.retain(|member| {
            let keep = member.status() != Status::Delete;
            if !keep {
                info!("Deleting {} from membership view", member);
            }
            keep
        });

        let removed = before - members.len();
        if removed > 0 {
            debug!("Cleanup removed {} of {} records", removed, before);
        }
        removed
    }

    /// Fold a peer's view into ours. See [`crate::merge`] for the rules.
    pub fn merge(&self, incoming: &[Member]) -> MergeOutcome {
        self.merge_at(incoming, Utc::now())
    }

    /// [`merge`](Self::merge) with an explicit clock reading.
    pub fn merge_at(&self, incoming: &[Member], now: DateTime<Utc>) -> MergeOutcome {
        let mut members = self.members.write();
        let local = std::mem::take(&mut *members);
        let (merged, outcome) = merge_members(local, incoming, now);
        *members = merged;

        if outcome.duplicates > 0 {
            warn!(
                "Incoming view repeated {} member ids, later copies ignored",
                outcome.duplicates
            );
        }
        debug!(
            "Merged {} incoming records: {} updated, {} added, {} ignored",
            incoming.len(),
            outcome.updated,
            outcome.added,
            outcome.ignored
        );
        outcome
    }

    /// Run one aging pass. Returns the ids that have just failed.
    pub fn age(&self, policy: &AgingPolicy) -> Vec<String> {
        self.age_at(policy, Utc::now())
    }

    /// [`age`](Self::age) with an explicit clock reading.
    pub fn age_at(&self, policy: &AgingPolicy, now: DateTime<Utc>) -> Vec<String> {
        let mut members = self.members.write();
        let failed = age_members(&mut members, policy, now);
        for id in &failed {
            warn!("Host detected as failed: {}", id);
        }
        failed
    }
}

impl fmt::Display for MembershipView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members = self.members.read();
        f.write_str("[")?;
        for (i, member) in members.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{member}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::MemberState;
    use chrono::TimeDelta;
    use std::sync::Arc;
    use std::time::Duration;

    fn member(id: &str, status: Status) -> Member {
        Member::with_state(
            id,
            7201,
            MemberState::at(status, Utc::now() - TimeDelta::seconds(10)),
            0,
        )
    }

    fn statuses(view: &MembershipView) -> Vec<(String, Status)> {
        view.snapshot()
            .into_iter()
            .map(|m| (m.id().to_string(), m.status()))
            .collect()
    }

    #[test]
    fn test_append_returns_position() {
        let view = MembershipView::new();

        assert!(view.is_empty());
        assert_eq!(view.append(Member::new("a", 1)), 0);
        assert_eq!(view.append(Member::new("b", 2)), 1);
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let view = MembershipView::new();
        view.append(Member::new("a", 1));

        let snapshot = view.snapshot();
        view.mark_left("a");
        view.append(Member::new("b", 2));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status(), Status::Alive);
    }

    #[test]
    fn test_bump_self_incarnation() {
        let view = MembershipView::with_members(vec![member("me", Status::Alive)]);

        assert!(view.bump_self_incarnation("me"));
        assert!(view.bump_self_incarnation("me"));
        assert!(!view.bump_self_incarnation("someone-else"));

        assert_eq!(view.get("me").unwrap().incarnation(), 2);
    }

    #[test]
    fn test_bump_after_max_incarnation_rumor_is_noop() {
        let view = MembershipView::with_members(vec![Member::new("me", 1)]);
        let rumor =
            Member::with_state("me", 1, MemberState::now(Status::Suspicious), u64::MAX);

        assert_eq!(view.merge(&[rumor]).updated, 1);
        let before = view.get("me").unwrap();

        assert!(!view.bump_self_incarnation("me"));
        assert_eq!(view.get("me").unwrap(), before);
        assert_eq!(before.incarnation(), u64::MAX);
    }

    #[test]
    fn test_mark_suspicious_only_from_alive() {
        let view = MembershipView::new();
        let now = Utc::now();
        view.append(member("a", Status::Alive));

        assert!(view.mark_suspicious_at("a", now));

        let marked = view.get("a").unwrap();
        assert_eq!(marked.status(), Status::Suspicious);
        assert_eq!(marked.last_transition(), now);
    }

    #[test]
    fn test_mark_suspicious_leaves_other_statuses_untouched() {
        for status in [Status::Suspicious, Status::Failed, Status::Left, Status::Delete] {
            let original = member("a", status);
            let view = MembershipView::with_members(vec![original.clone()]);

            assert!(!view.mark_suspicious("a"));
            assert_eq!(view.get("a").unwrap(), original, "{status} was modified");
        }
    }

    #[test]
    fn test_mark_suspicious_unknown_id_is_noop() {
        let view = MembershipView::with_members(vec![member("a", Status::Alive)]);

        assert!(!view.mark_suspicious("b"));
        assert_eq!(view.get("a").unwrap().status(), Status::Alive);
    }

    #[test]
    fn test_mark_left_is_unconditional() {
        for status in [
            Status::Alive,
            Status::Suspicious,
            Status::Failed,
            Status::Delete,
            Status::Left,
        ] {
            let original = member("a", status);
            let view = MembershipView::with_members(vec![original.clone()]);

            assert!(view.mark_left("a"));
            let left = view.get("a").unwrap();
            assert_eq!(left.status(), Status::Left);
            assert!(left.last_transition() > original.last_transition());
        }

        assert!(!MembershipView::new().mark_left("ghost"));
    }

    #[test]
    fn test_cleanup_keeps_survivors_in_order() {
        let view = MembershipView::with_members(vec![
            member("a", Status::Delete),
            member("b", Status::Alive),
            member("c", Status::Delete),
        ]);

        assert_eq!(view.cleanup(), 2);
        assert_eq!(statuses(&view), [("b".to_string(), Status::Alive)]);
    }

    #[test]
    fn test_cleanup_only_removes_tombstones() {
        let view = MembershipView::with_members(vec![
            member("a", Status::Failed),
            member("b", Status::Left),
            member("c", Status::Suspicious),
            member("d", Status::Alive),
        ]);

        assert_eq!(view.cleanup(), 0);
        assert_eq!(view.len(), 4);
    }

    #[test]
    fn test_merge_replaces_contents() {
        let view = MembershipView::with_members(vec![member("a", Status::Alive)]);
        let incoming = vec![member("a", Status::Failed), member("b", Status::Alive)];

        let outcome = view.merge(&incoming);

        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.added, 1);
        assert_eq!(
            statuses(&view),
            [
                ("a".to_string(), Status::Failed),
                ("b".to_string(), Status::Alive)
            ]
        );
    }

    #[test]
    fn test_merge_rejects_unknown_failed_member() {
        let view = MembershipView::with_members(vec![member("a", Status::Alive)]);

        view.merge(&[member("z", Status::Failed)]);

        assert!(view.get("z").is_none());
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn test_merge_own_snapshot_is_idempotent() {
        let view = MembershipView::with_members(vec![
            member("a", Status::Alive),
            member("b", Status::Suspicious),
            member("c", Status::Left),
        ]);
        let before = view.snapshot();

        let outcome = view.merge(&before);

        assert!(!outcome.changed());
        assert_eq!(view.snapshot(), before);
    }

    #[test]
    fn test_delete_reached_only_through_thresholds() {
        let policy = AgingPolicy {
            t_fail: Duration::from_secs(2),
            t_delete: Duration::from_secs(2),
            t_leave: Duration::from_secs(4),
        };
        let start = Utc::now() - TimeDelta::hours(1);
        let view = MembershipView::with_members(vec![
            Member::with_state("s", 1, MemberState::at(Status::Alive, start), 0),
            Member::with_state("l", 2, MemberState::at(Status::Alive, start), 0),
        ]);
        view.mark_suspicious_at("s", start);
        view.mark_left("l");
        let left_at = view.get("l").unwrap().last_transition();

        assert_eq!(
            view.age_at(&policy, start + TimeDelta::seconds(1)),
            Vec::<String>::new()
        );
        assert_eq!(view.age_at(&policy, start + TimeDelta::seconds(2)), ["s"]);

        let failed_at = start + TimeDelta::seconds(2);
        view.age_at(&policy, failed_at + TimeDelta::seconds(1));
        assert_eq!(view.get("s").unwrap().status(), Status::Failed);

        view.age_at(&policy, failed_at + TimeDelta::seconds(2));
        assert_eq!(view.get("s").unwrap().status(), Status::Delete);
        assert_eq!(view.get("l").unwrap().status(), Status::Left);

        view.age_at(&policy, left_at + TimeDelta::seconds(4));
        assert_eq!(view.get("l").unwrap().status(), Status::Delete);

        assert_eq!(view.cleanup(), 2);
        assert!(view.is_empty());
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let view = Arc::new(MembershipView::new());
        for i in 0..8 {
            view.append(Member::new(format!("node-{i}"), 7000 + i));
        }

        let handles: Vec<_> = (0..8u16)
            .map(|i| {
                let view = Arc::clone(&view);
                std::thread::spawn(move || {
                    let id = format!("node-{i}");
                    for _ in 0..100 {
                        view.bump_self_incarnation(&id);
                        let snapshot = view.snapshot();
                        assert_eq!(snapshot.len(), 8);
                        view.merge(&snapshot);
                    }
                    view.mark_suspicious(&id);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for member in view.snapshot() {
            assert_eq!(member.incarnation(), 100);
            assert_eq!(member.status(), Status::Suspicious);
        }
    }

    #[test]
    fn test_display_lists_members() {
        let view = MembershipView::new();
        assert_eq!(view.to_string(), "[]");

        view.append(Member::new("a", 1));
        view.append(Member::new("b", 2));
        let rendered = view.to_string();
        assert!(rendered.starts_with("[[a || Alive at "));
        assert!(rendered.contains("|| 0], [b || Alive at "));
    }
}
