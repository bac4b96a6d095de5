//! Application startup and lifecycle management.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use sync_core::error::SyncError;

use crate::clients::{SourceClient, TargetClient};
use crate::config::BridgeConfig;
use crate::services::{Scheduler, Synchronizer, WarningLedger};
use crate::services::scheduler::StatusHandle;

/// Wired-up application, ready to run.
pub struct Application {
    scheduler: Scheduler,
}

impl Application {
    pub fn build(config: BridgeConfig) -> Result<Self, SyncError> {
        let source = Arc::new(SourceClient::new(config.source.clone())?);
        let target = Arc::new(TargetClient::new(config.target.clone())?);
        let warnings = WarningLedger::new(&config.data_dir);

        let synchronizer = Arc::new(Synchronizer::new(source, target, warnings, &config));
        let scheduler = Scheduler::new(synchronizer, config.scheduler.clone());

        Ok(Self { scheduler })
    }

    /// Read-only status view for an operator-facing observer.
    pub fn status_handle(&self) -> StatusHandle {
        self.scheduler.status_handle()
    }

    /// Run the scheduler loop until the token is cancelled. An in-flight
    /// invoice always finishes before the loop exits.
    pub async fn run_until_stopped(&self, cancel: CancellationToken) {
        self.scheduler.run(cancel).await;
    }
}
