//! Requests accepted at the dispatch boundary and their responses.
//!
//! Both travel as JSON objects, one per datagram. Requests are tagged by
//! `op`, responses by `result`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use swim_membership::{Member, MergeOutcome};

use crate::error::{Error, Result};

/// Largest UDP payload that fits an IPv4 datagram.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Operations a peer or local driver may invoke on the membership view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Return a copy of the whole view
    Snapshot,

    /// Return the number of records
    Length,

    /// Fold the given view into ours
    Merge {
        /// Sender's view
        members: Vec<Member>,
    },

    /// Suspect a member
    MarkSuspicious {
        /// Member id
        id: String,
    },

    /// Record a member's departure
    MarkLeft {
        /// Member id
        id: String,
    },

    /// Raise a member's own incarnation
    BumpIncarnation {
        /// Member id
        id: String,
    },

    /// Drop tombstones
    Cleanup,
}

impl Request {
    /// Operation name as it appears on the wire.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Length => "length",
            Self::Merge { .. } => "merge",
            Self::MarkSuspicious { .. } => "mark_suspicious",
            Self::MarkLeft { .. } => "mark_left",
            Self::BumpIncarnation { .. } => "bump_incarnation",
            Self::Cleanup => "cleanup",
        }
    }
}

/// Reply to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Response {
    /// Copy of the view
    Members {
        /// Members in view order
        members: Vec<Member>,
    },

    /// Number of records
    Length {
        /// Record count
        length: usize,
    },

    /// What a merge did
    Merged(MergeOutcome),

    /// Whether a by-id update found and changed its member
    Updated {
        /// Whether the view changed
        changed: bool,
    },

    /// How many tombstones were dropped
    Cleaned {
        /// Records removed
        removed: usize,
    },

    /// The request could not be served
    Error {
        /// Human readable reason
        message: String,
    },
}

impl Response {
    /// Response name as it appears on the wire.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Members { .. } => "members",
            Self::Length { .. } => "length",
            Self::Merged(_) => "merged",
            Self::Updated { .. } => "updated",
            Self::Cleaned { .. } => "cleaned",
            Self::Error { .. } => "error",
        }
    }
}

fn encode<T: Serialize>(message: &T) -> Result<Bytes> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_DATAGRAM_SIZE {
        return Err(Error::TooLarge {
            size: payload.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }
    Ok(Bytes::from(payload))
}

impl TryFrom<&Request> for Bytes {
    type Error = Error;

    fn try_from(request: &Request) -> Result<Self> {
        encode(request)
    }
}

impl TryFrom<&[u8]> for Request {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(value)?)
    }
}

impl TryFrom<&Response> for Bytes {
    type Error = Error;

    fn try_from(response: &Response) -> Result<Self> {
        encode(response)
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(value)?)
    }
}
