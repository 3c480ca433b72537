//! Runs one membership node: aging monitor plus dispatch server.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use swim_bootable::{Bootable, BootableError};
use swim_dispatch::{DispatchClient, DispatchServer, Dispatcher};
use swim_membership::{AgingMonitor, Member, MembershipConfig, MembershipView, UdpNotifier};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A service failed to start or stop
    #[error("{service} failed: {message}")]
    Service {
        /// Name of the service.
        service: String,
        /// Underlying error.
        message: String,
    },

    /// Signal handling failed
    #[error("signal error: {0}")]
    Signal(#[from] std::io::Error),
}

impl Error {
    fn service(bootable: &dyn Bootable, e: &BootableError) -> Self {
        Self::Service {
            service: bootable.bootable_name().to_string(),
            message: e.to_string(),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Identifier of this member
    #[arg(long, env = "SWIM_ID", default_value_t = default_id())]
    id: String,

    /// UDP address the dispatch server listens on
    #[arg(long, default_value = "0.0.0.0:7201", env = "SWIM_BIND")]
    bind: SocketAddr,

    /// Dispatch address of a member to join through
    #[arg(long, env = "SWIM_INTRODUCER")]
    introducer: Option<SocketAddr>,

    /// Seconds a member may stay suspicious before it is declared failed
    #[arg(long, default_value_t = 1, env = "SWIM_T_FAIL")]
    t_fail: u64,

    /// Seconds a failed member is kept before it becomes a tombstone
    #[arg(long, default_value_t = 1, env = "SWIM_T_DELETE")]
    t_delete: u64,

    /// Seconds a departed member is kept before it becomes a tombstone
    #[arg(long, default_value_t = 2, env = "SWIM_T_LEAVE")]
    t_leave: u64,

    /// Aging monitor period in milliseconds
    #[arg(
        long,
        default_value_t = 1000,
        env = "SWIM_AGE_INTERVAL_MS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    age_interval_ms: u64,

    /// Where failure notices are sent
    #[arg(long, default_value = "127.0.0.1:7200", env = "SWIM_NOTIFY_ADDR")]
    notify_addr: SocketAddr,
}

impl Args {
    fn membership_config(&self) -> MembershipConfig {
        MembershipConfig {
            t_fail: Duration::from_secs(self.t_fail),
            t_delete: Duration::from_secs(self.t_delete),
            t_leave: Duration::from_secs(self.t_leave),
            age_interval: Duration::from_millis(self.age_interval_ms),
            notify_addr: self.notify_addr,
            ..MembershipConfig::default()
        }
    }
}

fn default_id() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

/// Push our view to the introducer, then fold its view into ours.
async fn join(client: &DispatchClient, view: &MembershipView, introducer: SocketAddr) {
    match client.push_merge(introducer, view.snapshot()).await {
        Ok(outcome) => info!(
            "Introducer {} merged our view: {} updated, {} added",
            introducer, outcome.updated, outcome.added
        ),
        Err(e) => {
            warn!("Couldn't push view to introducer {}: {}", introducer, e);
            return;
        }
    }

    match client.fetch_snapshot(introducer).await {
        Ok(members) => {
            let outcome = view.merge(&members);
            info!(
                "Joined through {}: {} members known ({} added)",
                introducer,
                view.len(),
                outcome.added
            );
        }
        Err(e) => warn!("Couldn't fetch view from introducer {}: {}", introducer, e),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = args.membership_config();

    let view = Arc::new(MembershipView::new());
    view.append(Member::new(args.id.clone(), args.bind.port()));
    info!("Starting member {} on {}", args.id, args.bind);

    let monitor = AgingMonitor::new(
        Arc::clone(&view),
        Arc::new(UdpNotifier::new(config.notify_addr)),
        &config,
    );
    let server = DispatchServer::new(args.bind, Dispatcher::new(Arc::clone(&view)));

    let services: [&dyn Bootable; 2] = [&monitor, &server];
    for service in services {
        service
            .start()
            .await
            .map_err(|e| Error::service(service, &e))?;
    }

    if let Some(introducer) = args.introducer {
        join(&DispatchClient::default(), &view, introducer).await;
    }

    tokio::signal::ctrl_c().await?;
    info!("Received interrupt signal, shutting down");

    for service in services.into_iter().rev() {
        if let Err(e) = service.shutdown().await {
            error!("{}", Error::service(service, &e));
        }
    }

    info!("Final view: {}", view);
    Ok(())
}
