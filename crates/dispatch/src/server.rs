//! UDP server answering dispatch requests, one datagram each way.

use std::fmt::{self, Debug};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use swim_bootable::{Bootable, BootableError};
use tokio::net::UdpSocket;
use tokio::sync::{RwLock, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::message::MAX_DATAGRAM_SIZE;

/// Grace period for the receive loop to exit on shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct BootableState {
    local_addr: Option<SocketAddr>,
    serve_task: Option<JoinHandle<()>>,
    shutdown_signal: Option<oneshot::Sender<()>>,
}

/// Serves a [`Dispatcher`] over UDP.
#[derive(Clone)]
pub struct DispatchServer {
    bind_addr: SocketAddr,
    dispatcher: Dispatcher,
    bootable_state: Arc<RwLock<BootableState>>,
}

impl DispatchServer {
    /// Server that will listen on `bind_addr` once started.
    #[must_use]
    pub fn new(bind_addr: SocketAddr, dispatcher: Dispatcher) -> Self {
        Self {
            bind_addr,
            dispatcher,
            bootable_state: Arc::new(RwLock::new(BootableState::default())),
        }
    }

    /// Address the socket is bound to; resolves port 0 to the real port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotStarted`] before [`Bootable::start`] succeeds.
    pub async fn local_addr(&self) -> Result<SocketAddr> {
        self.bootable_state
            .read()
            .await
            .local_addr
            .ok_or(Error::NotStarted)
    }

    async fn reply(socket: &UdpSocket, dispatcher: &Dispatcher, payload: &[u8], from: SocketAddr) {
        let reply = match dispatcher.handle_bytes(payload) {
            Ok(reply) => reply,
            Err(e) => {
                error!("Couldn't encode reply for {}: {}", from, e);
                return;
            }
        };

        if let Err(e) = socket.send_to(&reply, from).await {
            warn!("Couldn't send reply to {}: {}", from, e);
        }
    }
}

impl Debug for DispatchServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchServer")
            .field("bind_addr", &self.bind_addr)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Bootable for DispatchServer {
    fn bootable_name(&self) -> &str {
        "DispatchServer"
    }

    async fn start(&self) -> std::result::Result<(), BootableError> {
        let mut state = self.bootable_state.write().await;
        if state.serve_task.is_some() {
            warn!("Dispatch server already running");
            return Ok(());
        }

        let socket = Arc::new(UdpSocket::bind(self.bind_addr).await?);
        let local_addr = socket.local_addr()?;
        info!("Dispatch server listening on {}", local_addr);

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let dispatcher = self.dispatcher.clone();

        let serve_task = tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                tokio::select! {
                    received = socket.recv_from(&mut buf) => {
                        match received {
                            Ok((len, from)) => {
                                debug!("Received {} bytes from {}", len, from);
                                let payload = buf[..len].to_vec();
                                let socket = Arc::clone(&socket);
                                let dispatcher = dispatcher.clone();
                                tokio::spawn(async move {
                                    Self::reply(&socket, &dispatcher, &payload, from).await;
                                });
                            }
                            Err(e) => {
                                // UDP receive errors are per datagram; keep serving.
                                warn!("Error receiving datagram: {}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        info!("Dispatch server received shutdown signal");
                        break;
                    }
                }
            }

            debug!("Dispatch server loop exiting");
        });

        state.local_addr = Some(local_addr);
        state.serve_task = Some(serve_task);
        state.shutdown_signal = Some(shutdown_tx);

        Ok(())
    }

    async fn shutdown(&self) -> std::result::Result<(), BootableError> {
        info!("Shutting down dispatch server");

        let mut state = self.bootable_state.write().await;

        if let Some(shutdown_tx) = state.shutdown_signal.take() {
            let _ = shutdown_tx.send(());
        }

        if let Some(task) = state.serve_task.take() {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => debug!("Dispatch server shut down cleanly"),
                Ok(Err(e)) => error!("Dispatch server task panicked: {}", e),
                Err(_) => error!("Dispatch server did not shut down within timeout"),
            }
        }

        state.local_addr = None;
        Ok(())
    }

    async fn wait(&self) {
        let task_handle = {
            let state = self.bootable_state.read().await;
            state.serve_task.as_ref().map(JoinHandle::abort_handle)
        };

        if let Some(handle) = task_handle {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}
