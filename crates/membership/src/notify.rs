//! Failure notices pushed to the subsystem that reacts to node loss.
//!
//! A notice is a single datagram: one kind byte, a `:` and the member id.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, NoticeError, Result};

const SEPARATOR: u8 = b':';

/// Kind tag carried in the first byte of a notice.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Member record changed
    Update = 1,
    /// Member joined
    Join = 2,
    /// Member confirmed failed
    Failed = 3,
    /// Member removed
    Delete = 4,
}

impl TryFrom<u8> for MessageKind {
    type Error = NoticeError;

    fn try_from(tag: u8) -> std::result::Result<Self, Self::Error> {
        match tag {
            1 => Ok(Self::Update),
            2 => Ok(Self::Join),
            3 => Ok(Self::Failed),
            4 => Ok(Self::Delete),
            other => Err(NoticeError::UnknownKind(other)),
        }
    }
}

/// A decoded notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNotice {
    /// What happened to the member.
    pub kind: MessageKind,
    /// Stable id of the member.
    pub member_id: String,
}

impl FailureNotice {
    /// Notice announcing that `member_id` failed.
    pub fn failed(member_id: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Failed,
            member_id: member_id.into(),
        }
    }

    /// Wire form: kind byte, `:`, id bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.member_id.len() + 2);
        buf.push(self.kind as u8);
        buf.push(SEPARATOR);
        buf.extend_from_slice(self.member_id.as_bytes());
        buf
    }

    /// Parse a received datagram.
    ///
    /// # Errors
    ///
    /// Returns a [`NoticeError`] describing the first malformed part.
    pub fn decode(buf: &[u8]) -> std::result::Result<Self, NoticeError> {
        let (&tag, rest) = buf.split_first().ok_or(NoticeError::Empty)?;
        let kind = MessageKind::try_from(tag)?;

        let id = match rest.split_first() {
            Some((&SEPARATOR, id)) => id,
            _ => return Err(NoticeError::MissingSeparator),
        };
        let member_id = std::str::from_utf8(id).map_err(|_| NoticeError::InvalidId)?;
        if member_id.is_empty() {
            return Err(NoticeError::InvalidId);
        }

        Ok(Self {
            kind,
            member_id: member_id.to_string(),
        })
    }
}

/// Destination for failure notices.
///
/// Delivery is best effort: implementations send once and do not wait for
/// any acknowledgement.
#[async_trait]
pub trait FailureNotifier: Send + Sync + 'static {
    /// Deliver one notice.
    async fn notify(&self, notice: &FailureNotice) -> Result<()>;
}

/// Sends notices as UDP datagrams to a fixed address.
#[derive(Debug)]
pub struct UdpNotifier {
    target: SocketAddr,
    sent: AtomicU64,
}

impl UdpNotifier {
    /// Notifier sending to `target`.
    #[must_use]
    pub const fn new(target: SocketAddr) -> Self {
        Self {
            target,
            sent: AtomicU64::new(0),
        }
    }

    /// Address notices are sent to.
    #[must_use]
    pub const fn target(&self) -> SocketAddr {
        self.target
    }

    /// Number of datagrams handed to the socket so far.
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    fn bind_addr(&self) -> SocketAddr {
        if self.target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        }
    }
}

#[async_trait]
impl FailureNotifier for UdpNotifier {
    async fn notify(&self, notice: &FailureNotice) -> Result<()> {
        let socket = UdpSocket::bind(self.bind_addr()).await?;
        let payload = notice.encode();
        socket.send_to(&payload, self.target).await?;
        self.sent.fetch_add(1, Ordering::Relaxed);

        debug!(
            "Sent {:?} notice for {} to {}",
            notice.kind, notice.member_id, self.target
        );
        Ok(())
    }
}

/// Discards every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl FailureNotifier for NoopNotifier {
    async fn notify(&self, notice: &FailureNotice) -> Result<()> {
        debug!("Dropping notice for {}", notice.member_id);
        Ok(())
    }
}

/// Forwards notices to an in-process channel, for embedding the core in a
/// process that consumes notices itself.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<FailureNotice>,
}

impl ChannelNotifier {
    /// Notifier and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FailureNotice>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl FailureNotifier for ChannelNotifier {
    async fn notify(&self, notice: &FailureNotice) -> Result<()> {
        self.sender
            .send(notice.clone())
            .map_err(|_| Error::ChannelClosed)
    }
}
