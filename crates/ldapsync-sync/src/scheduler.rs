//! Periodic pass scheduling

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use ldapsync_core::{AccountApi, DirectorySource, Result, SyncError, TombstoneStore};

use crate::report::PassReport;
use crate::service::SyncService;

/// Runs passes back to back, sleeping `interval` after each one finishes.
pub struct SyncScheduler<D, A, T>
where
    D: DirectorySource + ?Sized,
    A: AccountApi + ?Sized,
    T: TombstoneStore + ?Sized,
{
    service: SyncService<D, A, T>,
    interval: Duration,
}

impl<D, A, T> SyncScheduler<D, A, T>
where
    D: DirectorySource + ?Sized,
    A: AccountApi + ?Sized,
    T: TombstoneStore + ?Sized,
{
    pub fn new(service: SyncService<D, A, T>, interval: Duration) -> Self {
        Self { service, interval }
    }

    pub fn from_hours(service: SyncService<D, A, T>, hours: u64) -> Self {
        Self::new(service, Duration::from_secs(hours.saturating_mul(3600)))
    }

    pub async fn run_once(&mut self) -> Result<PassReport> {
        self.service.run_pass().await
    }

    /// Loop until `cancel` fires. A failed pass is logged and retried at the
    /// next interval; the current pass always runs to its end.
    pub async fn run(&mut self, cancel: CancellationToken) {
        let wait = describe_interval(self.interval);

        loop {
            match self.run_once().await {
                Ok(report) => info!("Pass complete: {}", report),
                Err(SyncError::Cancelled) => {
                    info!("Pass interrupted by shutdown");
                    break;
                }
                Err(e) => {
                    error!("An error occurred: {}", e);
                    warn!("Waiting for the next synchronization process in {} to retry", wait);
                }
            }

            if cancel.is_cancelled() {
                break;
            }

            info!("Awaiting resync in {}", wait);
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Scheduler stopped");
    }
}

fn describe_interval(interval: Duration) -> String {
    let hours = interval.as_secs() / 3600;
    match hours {
        0 => format!("{} second(s)", interval.as_secs()),
        1 => "1 hour".to_string(),
        n => format!("{} hours", n),
    }
}
