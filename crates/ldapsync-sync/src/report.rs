//! Per-pass outcome summary

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// A single per-user operation that did not succeed.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub account: String,
    pub operation: &'static str,
    pub message: String,
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub dry_run: bool,
    pub directory_users: usize,
    pub remote_accounts: usize,
    pub accounts_created: u32,
    pub accounts_updated: u32,
    pub accounts_deactivated: u32,
    pub accounts_reactivated: u32,
    /// Decisions logged but not applied because of dry-run mode.
    pub actions_skipped: u32,
    pub tombstones_added: u32,
    pub tombstones_removed: u32,
    pub failures: Vec<ItemFailure>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl PassReport {
    pub fn begin(dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            dry_run,
            directory_users: 0,
            remote_accounts: 0,
            accounts_created: 0,
            accounts_updated: 0,
            accounts_deactivated: 0,
            accounts_reactivated: 0,
            actions_skipped: 0,
            tombstones_added: 0,
            tombstones_removed: 0,
            failures: vec![],
            started_at: now,
            completed_at: now,
            duration_ms: 0,
        }
    }

    pub fn finish(&mut self) {
        self.completed_at = Utc::now();
        self.duration_ms = (self.completed_at - self.started_at).num_milliseconds();
    }

    pub fn record_failure(
        &mut self,
        account: impl Into<String>,
        operation: &'static str,
        message: impl Into<String>,
    ) {
        self.failures.push(ItemFailure {
            account: account.into(),
            operation,
            message: message.into(),
        });
    }

    /// Whether the tombstone set was modified and must be persisted.
    pub fn tombstones_changed(&self) -> bool {
        self.tombstones_added > 0 || self.tombstones_removed > 0
    }

    /// Number of remote mutations issued successfully.
    pub fn mutations(&self) -> u32 {
        self.accounts_created
            + self.accounts_updated
            + self.accounts_deactivated
            + self.accounts_reactivated
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} directory users, {} remote accounts: {} created, {} updated, {} deactivated, {} reactivated, {} failed",
            self.directory_users,
            self.remote_accounts,
            self.accounts_created,
            self.accounts_updated,
            self.accounts_deactivated,
            self.accounts_reactivated,
            self.failures.len(),
        )?;
        if self.dry_run {
            write!(f, " (dry run, {} actions skipped)", self.actions_skipped)?;
        }
        write!(f, " in {}ms", self.duration_ms)
    }
}
