//! Client side of the dispatch boundary.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use swim_membership::{Member, MergeOutcome};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::{Error, Result};
use crate::message::{MAX_DATAGRAM_SIZE, Request, Response};

/// Default time to wait for a reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Sends one request per datagram and waits for the matching reply.
#[derive(Debug, Clone, Copy)]
pub struct DispatchClient {
    timeout: Duration,
}

impl DispatchClient {
    /// Client waiting at most `timeout` for each reply.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Send `request` to the server at `addr` and return its reply as is.
    ///
    /// # Errors
    ///
    /// Fails on socket errors, encoding errors, or when no reply arrives
    /// within the timeout.
    pub async fn request(&self, addr: SocketAddr, request: &Request) -> Result<Response> {
        let payload = Bytes::try_from(request)?;

        let bind_addr = if addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(addr).await?;
        socket.send(&payload).await?;
        debug!("Sent {} request to {}", request.name(), addr);

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let len = tokio::time::timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        Response::try_from(&buf[..len])
    }

    /// Fetch the peer's whole view.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request); also fails on an error or mismatched
    /// reply.
    pub async fn fetch_snapshot(&self, addr: SocketAddr) -> Result<Vec<Member>> {
        let request = Request::Snapshot;
        match self.request(addr, &request).await? {
            Response::Members { members } => Ok(members),
            other => Err(unexpected(&request, other)),
        }
    }

    /// Ask the peer to merge `members` into its view.
    ///
    /// # Errors
    ///
    /// See [`fetch_snapshot`](Self::fetch_snapshot).
    pub async fn push_merge(&self, addr: SocketAddr, members: Vec<Member>) -> Result<MergeOutcome> {
        let request = Request::Merge { members };
        match self.request(addr, &request).await? {
            Response::Merged(outcome) => Ok(outcome),
            other => Err(unexpected(&request, other)),
        }
    }
}

impl Default for DispatchClient {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

fn unexpected(request: &Request, response: Response) -> Error {
    match response {
        Response::Error { message } => Error::Remote(message),
        other => Error::UnexpectedResponse {
            request: request.name(),
            response: other.name(),
        },
    }
}
