//! Reconciliation of the local view with a view received from a peer.
//!
//! Incoming records are matched to local ones by id, so neither side has to
//! be sorted. For a matched pair:
//!
//! 1. A terminal local status (`Failed`, `Delete`, `Left`) is kept as is.
//! 2. Otherwise a terminal incoming status is adopted immediately, whatever
//!    the incarnations say.
//! 3. Otherwise the incoming status and incarnation win only with a strictly
//!    greater incarnation.
//!
//! Unmatched local records are kept. Unmatched incoming records are added
//! when they are `Alive` or `Suspicious`; terminal strangers are dropped.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::member::Member;

/// Counters describing what a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// Local records whose status or incarnation changed.
    pub updated: usize,

    /// Previously unknown members appended to the view.
    pub added: usize,

    /// Previously unknown members skipped because of a terminal status.
    pub ignored: usize,

    /// Incoming records dropped because an earlier one had the same id.
    pub duplicates: usize,
}

impl MergeOutcome {
    /// Whether the merge changed the view at all.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.updated > 0 || self.added > 0
    }
}

/// Merge `incoming` into `local`, stamping every change with `now`.
///
/// Local order is preserved; new members follow in incoming order.
#[must_use]
pub fn merge_members(
    local: Vec<Member>,
    incoming: &[Member],
    now: DateTime<Utc>,
) -> (Vec<Member>, MergeOutcome) {
    let mut outcome = MergeOutcome::default();

    let mut pending: HashMap<&str, &Member> = HashMap::with_capacity(incoming.len());
    let mut arrival = Vec::with_capacity(incoming.len());
    for theirs in incoming {
        match pending.entry(theirs.id()) {
            Entry::Vacant(slot) => {
                slot.insert(theirs);
                arrival.push(theirs);
            }
            Entry::Occupied(_) => outcome.duplicates += 1,
        }
    }

    let mut merged = local;
    for ours in &mut merged {
        if let Some(theirs) = pending.remove(ours.id()) {
            if reconcile(ours, theirs, now) {
                outcome.updated += 1;
            }
        }
    }

    // Whatever is still pending was never seen locally.
    for theirs in arrival {
        if !pending.contains_key(theirs.id()) {
            continue;
        }

        if theirs.status().is_admissible() {
            let mut member = theirs.clone();
            member.state_mut().last_transition = now;
            merged.push(member);
            outcome.added += 1;
        } else {
            outcome.ignored += 1;
        }
    }

    (merged, outcome)
}

/// Apply the conflict rules for one matched pair. Returns whether `ours`
/// changed.
fn reconcile(ours: &mut Member, theirs: &Member, now: DateTime<Utc>) -> bool {
    if ours.status().is_terminal() {
        return false;
    }

    // `ours` is non-terminal here, so a terminal claim always differs from it.
    let claimed = theirs.status();
    if claimed.is_terminal() {
        ours.state_mut().transition(claimed, now);
        return true;
    }

    if theirs.incarnation() > ours.incarnation() {
        ours.state_mut().transition(claimed, now);
        ours.set_incarnation(theirs.incarnation());
        return true;
    }

    false
}
