//! Lifecycle interface shared by the long-running services of a member
//! process (the aging monitor, the dispatch server).
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use async_trait::async_trait;

/// Boxed error returned by service lifecycle hooks.
pub type BootableError = Box<dyn std::error::Error + Send + Sync>;

/// A service that can be started in the background, asked to stop, and
/// awaited.
#[async_trait]
pub trait Bootable
where
    Self: Send + Sync + 'static,
{
    /// Name used in logs.
    fn bootable_name(&self) -> &str;

    /// Spawn the service's background work and return once it is running.
    async fn start(&self) -> Result<(), BootableError>;

    /// Signal the service to stop and wait for its background work to end.
    async fn shutdown(&self) -> Result<(), BootableError>;

    /// Resolve once the background work has exited, for whatever reason.
    async fn wait(&self);
}
