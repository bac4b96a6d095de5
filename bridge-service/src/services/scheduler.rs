//! Sweep scheduler.
//!
//! One sequential loop drives all three cadences: the near-real-time
//! new-invoice sweep, the same-day resync of recent invoices, and the
//! periodic deep resync. Sweeps never run concurrently. Status is owned by
//! the loop and mutated only there; observers get read-only snapshots
//! through [`StatusHandle`].

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use sync_core::error::SyncError;

use crate::config::SchedulerConfig;
use crate::services::Synchronizer;

/// What the scheduler is currently doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running { sweep: &'static str },
    Stopped,
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub state: SchedulerState,
    pub last_sweep: Option<&'static str>,
    pub last_run_duration: Option<Duration>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
}

impl SyncStatus {
    fn initial() -> Self {
        Self {
            state: SchedulerState::Idle,
            last_sweep: None,
            last_run_duration: None,
            last_run_at: None,
            next_run_at: None,
        }
    }
}

/// Read-only view over the scheduler's status cell.
#[derive(Clone)]
pub struct StatusHandle {
    cell: Arc<RwLock<SyncStatus>>,
}

impl StatusHandle {
    pub fn snapshot(&self) -> SyncStatus {
        self.cell.read().expect("status lock poisoned").clone()
    }
}

struct Cadence {
    name: &'static str,
    interval: Duration,
    /// Unset until the first run, so every cadence fires once at startup.
    last_run: Option<tokio::time::Instant>,
}

impl Cadence {
    fn new(name: &'static str, interval: Duration) -> Self {
        Self {
            name,
            interval,
            last_run: None,
        }
    }

    fn due(&self, now: tokio::time::Instant) -> bool {
        match self.last_run {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        }
    }
}

pub struct Scheduler {
    synchronizer: Arc<Synchronizer>,
    config: SchedulerConfig,
    status: Arc<RwLock<SyncStatus>>,
}

impl Scheduler {
    pub fn new(synchronizer: Arc<Synchronizer>, config: SchedulerConfig) -> Self {
        Self {
            synchronizer,
            config,
            status: Arc::new(RwLock::new(SyncStatus::initial())),
        }
    }

    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle {
            cell: self.status.clone(),
        }
    }

    /// Run until the cancellation token fires. The token is also passed into
    /// each sweep, which checks it between invoices; a single invoice always
    /// completes.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut new_sweep = Cadence::new(
            "new-invoices",
            Duration::from_secs(self.config.new_invoice_interval_secs),
        );
        let mut recent_sweep = Cadence::new(
            "recent-resync",
            Duration::from_secs(self.config.recent_resync_interval_secs),
        );
        let mut deep_sweep = Cadence::new(
            "deep-resync",
            Duration::from_secs(self.config.deep_resync_interval_secs),
        );

        tracing::info!(
            new_interval_secs = self.config.new_invoice_interval_secs,
            recent_interval_secs = self.config.recent_resync_interval_secs,
            deep_interval_secs = self.config.deep_resync_interval_secs,
            "Scheduler started"
        );

        loop {
            let now = tokio::time::Instant::now();

            // Deep covers recent covers new; when several cadences are due
            // at once, only the widest one runs.
            if deep_sweep.due(now) {
                self.run_sweep(&mut deep_sweep, &cancel).await;
                recent_sweep.last_run = Some(now);
                new_sweep.last_run = Some(now);
            } else if recent_sweep.due(now) {
                self.run_sweep(&mut recent_sweep, &cancel).await;
                new_sweep.last_run = Some(now);
            } else if new_sweep.due(now) {
                self.run_sweep(&mut new_sweep, &cancel).await;
            }

            if cancel.is_cancelled() {
                break;
            }

            self.set_status(|status| {
                status.state = SchedulerState::Idle;
                status.next_run_at = Some(Utc::now() + chrono::Duration::seconds(1));
            });

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                _ = cancel.cancelled() => break,
            }
        }

        self.set_status(|status| {
            status.state = SchedulerState::Stopped;
            status.next_run_at = None;
        });
        tracing::info!("Scheduler stopped");
    }

    async fn run_sweep(&self, cadence: &mut Cadence, cancel: &CancellationToken) {
        let started = tokio::time::Instant::now();
        cadence.last_run = Some(started);
        self.set_status(|status| {
            status.state = SchedulerState::Running {
                sweep: cadence.name,
            };
        });
        tracing::info!(sweep = cadence.name, "Sweep starting");

        let result = self.dispatch(cadence.name, cancel).await;
        let elapsed = started.elapsed();
        match result {
            Ok(()) => {
                tracing::info!(sweep = cadence.name, elapsed_ms = elapsed.as_millis() as u64, "Sweep finished")
            }
            Err(e) => {
                tracing::error!(sweep = cadence.name, error = %e, "Sweep failed")
            }
        }

        self.set_status(|status| {
            status.last_sweep = Some(cadence.name);
            status.last_run_duration = Some(elapsed);
            status.last_run_at = Some(Utc::now());
        });
    }

    async fn dispatch(&self, sweep: &'static str, cancel: &CancellationToken) -> Result<(), SyncError> {
        match sweep {
            "recent-resync" => {
                self.synchronizer
                    .sync_recent_invoices(self.config.recent_resync_count, cancel)
                    .await
            }
            "deep-resync" => self.synchronizer.deep_resync(cancel).await,
            _ => self.synchronizer.sync_new_invoices(cancel).await,
        }
    }

    fn set_status<F: FnOnce(&mut SyncStatus)>(&self, mutate: F) {
        if let Ok(mut status) = self.status.write() {
            mutate(&mut status);
        }
    }
}
