//! Member record type.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::{MemberState, Status};

/// One cluster member as known by the local view.
///
/// The id is fixed at construction; state and incarnation only change
/// through [`MembershipView`](crate::MembershipView) operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    id: String,
    state: MemberState,
    incarnation: u64,
    port: u16,
}

impl Member {
    /// A freshly joined member: alive, incarnation zero, transitioned now.
    pub fn new(id: impl Into<String>, port: u16) -> Self {
        Self::with_state(id, port, MemberState::now(Status::Alive), 0)
    }

    /// A member with explicit state and incarnation.
    pub fn with_state(
        id: impl Into<String>,
        port: u16,
        state: MemberState,
        incarnation: u64,
    ) -> Self {
        Self {
            id: id.into(),
            state,
            incarnation,
            port,
        }
    }

    /// Stable identity, typically the host name.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &MemberState {
        &self.state
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.state.status
    }

    /// When the status last changed locally.
    #[must_use]
    pub const fn last_transition(&self) -> DateTime<Utc> {
        self.state.last_transition
    }

    /// Self-asserted generation counter.
    #[must_use]
    pub const fn incarnation(&self) -> u64 {
        self.incarnation
    }

    /// Gossip port of the member.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    pub(crate) fn state_mut(&mut self) -> &mut MemberState {
        &mut self.state
    }

    pub(crate) fn set_incarnation(&mut self, incarnation: u64) {
        self.incarnation = incarnation;
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} || {} || {}]", self.id, self.state, self.incarnation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_member_is_alive_at_incarnation_zero() {
        let member = Member::new("node-a", 7201);

        assert_eq!(member.id(), "node-a");
        assert_eq!(member.status(), Status::Alive);
        assert_eq!(member.incarnation(), 0);
        assert_eq!(member.port(), 7201);
    }

    #[test]
    fn test_display() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let member = Member::with_state("node-b", 7201, MemberState::at(Status::Left, at), 4);

        assert_eq!(
            member.to_string(),
            "[node-b || Left at 2024-01-02 03:04:05 UTC || 4]"
        );
    }

    #[test]
    fn test_json_round_trip_keeps_every_field() {
        let member =
            Member::with_state("node-c", 9000, MemberState::now(Status::Suspicious), 2);
        let json = serde_json::to_string(&member).unwrap();
        let decoded: Member = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, member);
    }
}
