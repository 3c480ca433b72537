//! Background service that ages the membership view on a fixed period and
//! reports new failures.

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use swim_bootable::{Bootable, BootableError};
use tokio::sync::{RwLock, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::aging::AgingPolicy;
use crate::config::MembershipConfig;
use crate::notify::{FailureNotice, FailureNotifier};
use crate::view::MembershipView;

/// Grace period for the aging task to exit on shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Bootable state for the background task
#[derive(Default)]
struct BootableState {
    aging_task: Option<JoinHandle<()>>,
    shutdown_signal: Option<oneshot::Sender<()>>,
}

/// Periodically ages a [`MembershipView`] and sends a failure notice for
/// every member that goes from suspicious to failed.
///
/// The failure decision is taken under the view's write lock; notices are
/// sent after it is released, so a slow or failing notifier never holds up
/// readers or merges.
#[derive(Clone)]
pub struct AgingMonitor {
    view: Arc<MembershipView>,
    notifier: Arc<dyn FailureNotifier>,
    policy: AgingPolicy,
    interval: Duration,
    cleanup_after_age: bool,
    notices_sent: Arc<AtomicU64>,
    notices_failed: Arc<AtomicU64>,
    bootable_state: Arc<RwLock<BootableState>>,
}

impl AgingMonitor {
    /// Create a monitor over `view` using the thresholds, interval and
    /// cleanup setting from `config`.
    pub fn new(
        view: Arc<MembershipView>,
        notifier: Arc<dyn FailureNotifier>,
        config: &MembershipConfig,
    ) -> Self {
        info!(
            "Creating aging monitor with interval {:?}, t_fail {:?}, t_delete {:?}, t_leave {:?}",
            config.age_interval, config.t_fail, config.t_delete, config.t_leave
        );

        Self {
            view,
            notifier,
            policy: config.aging_policy(),
            interval: config.age_interval,
            cleanup_after_age: config.cleanup_after_age,
            notices_sent: Arc::new(AtomicU64::new(0)),
            notices_failed: Arc::new(AtomicU64::new(0)),
            bootable_state: Arc::new(RwLock::new(BootableState::default())),
        }
    }

    /// The view being aged.
    #[must_use]
    pub const fn view(&self) -> &Arc<MembershipView> {
        &self.view
    }

    /// Thresholds in use.
    #[must_use]
    pub const fn policy(&self) -> &AgingPolicy {
        &self.policy
    }

    /// Notices delivered so far.
    #[must_use]
    pub fn notices_sent(&self) -> u64 {
        self.notices_sent.load(Ordering::Relaxed)
    }

    /// Notices that could not be delivered so far.
    #[must_use]
    pub fn failed_notifications(&self) -> u64 {
        self.notices_failed.load(Ordering::Relaxed)
    }

    /// Run a single aging pass, notify for new failures, and optionally drop
    /// tombstones. Returns the ids that failed in this pass.
    pub async fn run_once(&self) -> Vec<String> {
        let failed = self.view.age(&self.policy);

        for id in &failed {
            let notice = FailureNotice::failed(id.as_str());
            match self.notifier.notify(&notice).await {
                Ok(()) => {
                    self.notices_sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    // The member stays failed; the notice is simply lost.
                    self.notices_failed.fetch_add(1, Ordering::Relaxed);
                    warn!("Failed to send failure notice for {}: {}", id, e);
                }
            }
        }

        if self.cleanup_after_age {
            self.view.cleanup();
        }

        failed
    }
}

impl Debug for AgingMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgingMonitor")
            .field("policy", &self.policy)
            .field("interval", &self.interval)
            .field("cleanup_after_age", &self.cleanup_after_age)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Bootable for AgingMonitor {
    fn bootable_name(&self) -> &str {
        "AgingMonitor"
    }

    async fn start(&self) -> Result<(), BootableError> {
        let mut state = self.bootable_state.write().await;
        if state.aging_task.is_some() {
            warn!("Aging monitor already running");
            return Ok(());
        }

        info!("Starting aging monitor");

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let monitor = self.clone();

        let aging_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(monitor.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let failed = monitor.run_once().await;
                        if !failed.is_empty() {
                            debug!("Aging pass failed {} members", failed.len());
                        }
                    }
                    _ = &mut shutdown_rx => {
                        info!("Aging monitor received shutdown signal");
                        break;
                    }
                }
            }

            debug!("Aging task exiting");
        });

        state.aging_task = Some(aging_task);
        state.shutdown_signal = Some(shutdown_tx);

        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BootableError> {
        info!("Shutting down aging monitor");

        let mut state = self.bootable_state.write().await;

        if let Some(shutdown_tx) = state.shutdown_signal.take() {
            let _ = shutdown_tx.send(());
        }

        if let Some(task) = state.aging_task.take() {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => debug!("Aging task shut down cleanly"),
                Ok(Err(e)) => error!("Aging task panicked: {}", e),
                Err(_) => error!("Aging task did not shut down within timeout"),
            }
        }

        Ok(())
    }

    async fn wait(&self) {
        let task_handle = {
            let state = self.bootable_state.read().await;
            state.aging_task.as_ref().map(JoinHandle::abort_handle)
        };

        if let Some(handle) = task_handle {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}
