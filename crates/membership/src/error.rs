//! Error types for the membership core.

use thiserror::Error;

/// Errors raised around the membership view. View operations themselves
/// never fail; these come from delivering notices.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket error while delivering a notice
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Notice receiver has gone away
    #[error("Notice channel closed")]
    ChannelClosed,
}

/// Reasons a datagram is not a valid notice.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NoticeError {
    /// Zero-length datagram
    #[error("empty notice")]
    Empty,

    /// The kind tag is not followed by `:`
    #[error("missing ':' after kind tag")]
    MissingSeparator,

    /// Kind tag outside the known set
    #[error("unknown notice kind {0}")]
    UnknownKind(u8),

    /// Member id is empty or not UTF-8
    #[error("invalid member id")]
    InvalidId,
}

/// Result type for membership operations.
pub type Result<T> = std::result::Result<T, Error>;
