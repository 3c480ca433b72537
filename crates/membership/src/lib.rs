//! Membership and failure-detection core of a SWIM-style gossip protocol.
//!
//! Each process keeps a [`MembershipView`] of every known member. Views
//! received from peers are folded in with [`MembershipView::merge`], which
//! resolves conflicting claims by status and incarnation. An
//! [`AgingMonitor`] promotes statuses by elapsed time (suspicious members
//! fail, failed and departed members become tombstones) and sends a
//! [`FailureNotice`] whenever a member is confirmed failed.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod aging;
pub mod config;
pub mod error;
pub mod member;
pub mod merge;
pub mod monitor;
pub mod notify;
pub mod status;
pub mod view;

pub use aging::AgingPolicy;
pub use config::MembershipConfig;
pub use error::{Error, NoticeError, Result};
pub use member::Member;
pub use merge::MergeOutcome;
pub use monitor::AgingMonitor;
pub use notify::{
    ChannelNotifier, FailureNotice, FailureNotifier, MessageKind, NoopNotifier, UdpNotifier,
};
pub use status::{MemberState, Status};
pub use view::MembershipView;
