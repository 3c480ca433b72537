//! Error types for the dispatch boundary.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for dispatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while serving or issuing requests.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Payload is not a valid request or response
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// No reply arrived in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Encoded message does not fit in one datagram
    #[error("Message size {size} exceeds maximum {max}")]
    TooLarge {
        /// Size of the encoded message.
        size: usize,
        /// Maximum datagram payload.
        max: usize,
    },

    /// The peer answered with an error
    #[error("Remote error: {0}")]
    Remote(String),

    /// The peer answered with a response of the wrong kind
    #[error("Unexpected response to {request}: {response}")]
    UnexpectedResponse {
        /// Name of the request sent.
        request: &'static str,
        /// Name of the response received.
        response: &'static str,
    },

    /// Server was asked for its address before it was started
    #[error("Server not started")]
    NotStarted,
}
