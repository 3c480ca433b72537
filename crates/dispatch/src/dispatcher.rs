//! Maps each [`Request`] onto the matching membership view operation.

use std::sync::Arc;

use bytes::Bytes;
use swim_membership::MembershipView;
use tracing::{debug, warn};

use crate::error::Result;
use crate::message::{Request, Response};

/// Serves requests against a shared membership view.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    view: Arc<MembershipView>,
}

impl Dispatcher {
    /// Dispatcher over `view`.
    #[must_use]
    pub const fn new(view: Arc<MembershipView>) -> Self {
        Self { view }
    }

    /// The view requests are applied to.
    #[must_use]
    pub const fn view(&self) -> &Arc<MembershipView> {
        &self.view
    }

    /// Apply `request` to the view.
    #[must_use]
    pub fn dispatch(&self, request: Request) -> Response {
        debug!("Dispatching {}", request.name());

        match request {
            Request::Snapshot => Response::Members {
                members: self.view.snapshot(),
            },
            Request::Length => Response::Length {
                length: self.view.len(),
            },
            Request::Merge { members } => Response::Merged(self.view.merge(&members)),
            Request::MarkSuspicious { id } => Response::Updated {
                changed: self.view.mark_suspicious(&id),
            },
            Request::MarkLeft { id } => Response::Updated {
                changed: self.view.mark_left(&id),
            },
            Request::BumpIncarnation { id } => Response::Updated {
                changed: self.view.bump_self_incarnation(&id),
            },
            Request::Cleanup => Response::Cleaned {
                removed: self.view.cleanup(),
            },
        }
    }

    /// Decode a raw request, dispatch it, and encode the reply.
    ///
    /// Undecodable input and replies too large for a datagram are answered
    /// with [`Response::Error`].
    ///
    /// # Errors
    ///
    /// Returns an error only if even the error reply cannot be encoded.
    pub fn handle_bytes(&self, payload: &[u8]) -> Result<Bytes> {
        let response = match Request::try_from(payload) {
            Ok(request) => self.dispatch(request),
            Err(e) => {
                warn!("Rejecting malformed request: {}", e);
                Response::Error {
                    message: format!("malformed request: {e}"),
                }
            }
        };

        match Bytes::try_from(&response) {
            Ok(encoded) => Ok(encoded),
            Err(e) => {
                warn!("Could not encode {} response: {}", response.name(), e);
                Bytes::try_from(&Response::Error {
                    message: e.to_string(),
                })
            }
        }
    }
}
