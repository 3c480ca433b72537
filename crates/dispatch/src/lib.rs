//! Dispatch boundary for the membership core.
//!
//! Peers and local drivers talk to a member through a closed set of typed
//! [`Request`]s. A [`Dispatcher`] maps each one onto the matching
//! [`MembershipView`](swim_membership::MembershipView) operation, a
//! [`DispatchServer`] serves it over UDP, and a [`DispatchClient`] issues
//! requests to a remote member.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod server;

pub use client::DispatchClient;
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use message::{MAX_DATAGRAM_SIZE, Request, Response};
pub use server::DispatchServer;
