//! One reconciliation pass, end to end

use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use ldapsync_core::{AccountApi, DirectorySource, Result, SyncError, TombstoneStore};

use crate::credentials::CredentialManager;
use crate::engine::ReconciliationEngine;
use crate::report::PassReport;
use crate::snapshot::fetch_remote_snapshot;

/// Pass runner: owns the credential manager and wires the directory, the
/// remote account system and the tombstone store together.
pub struct SyncService<D, A, T>
where
    D: DirectorySource + ?Sized,
    A: AccountApi + ?Sized,
    T: TombstoneStore + ?Sized,
{
    directory: Arc<D>,
    api: Arc<A>,
    store: Arc<T>,
    credentials: CredentialManager<A>,
    engine: ReconciliationEngine<A>,
}

impl<D, A, T> SyncService<D, A, T>
where
    D: DirectorySource + ?Sized,
    A: AccountApi + ?Sized,
    T: TombstoneStore + ?Sized,
{
    pub fn new(
        directory: Arc<D>,
        api: Arc<A>,
        store: Arc<T>,
        credentials: CredentialManager<A>,
        dry_run: bool,
    ) -> Self {
        let engine = ReconciliationEngine::new(Arc::clone(&api), credentials.username(), dry_run);
        Self {
            directory,
            api,
            store,
            credentials,
            engine,
        }
    }

    /// Run one pass: fetch both sides, create missing accounts, then
    /// reconcile every existing one.
    ///
    /// Errors abort the pass. Tombstones recorded before an abort during
    /// reconciliation are still persisted.
    #[instrument(skip(self), fields(domain = %self.api.server_domain()))]
    pub async fn run_pass(&mut self) -> Result<PassReport> {
        info!("The synchronization process between LDAP and Synapse has been initiated");
        let mut report = PassReport::begin(self.engine.is_dry_run());

        let mut tombstones = self.store.load().await?;

        self.credentials.get_token().await?;
        let mut remote = fetch_remote_snapshot(self.api.as_ref(), &mut self.credentials).await?;
        if remote.is_empty() {
            info!("No registered users were fetched");
        }

        let directory = self.directory.fetch_users().await?;
        if directory.is_empty() {
            return Err(SyncError::directory(
                "Cannot retrieve LDAP users data; unable to proceed",
            ));
        }
        report.directory_users = directory.len();

        if self.engine.create_missing(&directory, &remote, &mut report).await {
            remote = fetch_remote_snapshot(self.api.as_ref(), &mut self.credentials).await?;
        }
        report.remote_accounts = remote.len();

        let reconciled = self
            .engine
            .reconcile_existing(
                &mut self.credentials,
                &directory,
                &remote,
                &mut tombstones,
                &mut report,
            )
            .await;

        if report.tombstones_changed() {
            if let Err(e) = self.store.save(&tombstones).await {
                error!("Failed to persist deleted users list: {}", e);
                if reconciled.is_ok() {
                    return Err(e);
                }
            }
        }

        if let Err(e) = reconciled {
            warn!(
                "Reconciliation stopped early after {} mutations",
                report.mutations()
            );
            return Err(e);
        }

        report.finish();
        info!(
            created = report.accounts_created,
            updated = report.accounts_updated,
            deactivated = report.accounts_deactivated,
            reactivated = report.accounts_reactivated,
            failed = report.failures.len(),
            "The synchronization process between LDAP and Synapse has been finished"
        );
        Ok(report)
    }
}
