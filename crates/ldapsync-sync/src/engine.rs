//! Reconciliation of the remote account set against the directory

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use ldapsync_core::{
    AccountApi, AccountId, AttributeUpdate, DirectorySnapshot, DirectoryUser, RegistrationRequest,
    RemoteAccount, RemoteOutcome, RemoteSnapshot, Result, TombstoneSet,
};

use crate::credentials::CredentialManager;
use crate::report::PassReport;

/// What a single existing remote account needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountAction {
    /// Gone from the directory and not yet handled: deactivate, erase and
    /// tombstone.
    Deactivate,
    /// Tombstoned but back in the directory.
    Reactivate,
    /// Present on both sides with differing attributes.
    Update(AttributeUpdate),
    /// Already deactivated by us, or already in sync.
    Nothing,
}

/// Decide the action for one remote account.
pub fn decide(
    directory_user: Option<&DirectoryUser>,
    remote: &RemoteAccount,
    tombstoned: bool,
) -> AccountAction {
    match (directory_user, tombstoned) {
        (None, false) => AccountAction::Deactivate,
        (None, true) => AccountAction::Nothing,
        (Some(_), true) => AccountAction::Reactivate,
        (Some(user), false) => {
            let update = AttributeUpdate::between(user, remote);
            if update.is_empty() {
                AccountAction::Nothing
            } else {
                AccountAction::Update(update)
            }
        }
    }
}

enum Mutation<'a> {
    Update(&'a AttributeUpdate),
    DeactivateAndErase,
    Reactivate,
}

impl Mutation<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Update(_) => "update",
            Self::DeactivateAndErase => "deactivate",
            Self::Reactivate => "reactivate",
        }
    }
}

pub struct ReconciliationEngine<A: AccountApi + ?Sized> {
    api: Arc<A>,
    /// The account the engine authenticates as; never reconciled.
    service_account: AccountId,
    dry_run: bool,
}

impl<A: AccountApi + ?Sized> ReconciliationEngine<A> {
    pub fn new(api: Arc<A>, service_localpart: &str, dry_run: bool) -> Self {
        let service_account = AccountId::new(service_localpart, api.server_domain());
        Self {
            api,
            service_account,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn account_id(&self, identifier: &str) -> AccountId {
        AccountId::new(identifier, self.api.server_domain())
    }

    /// Directory users with no remote account, sorted by identifier.
    pub fn missing_accounts<'a>(
        &self,
        directory: &'a DirectorySnapshot,
        remote: &RemoteSnapshot,
    ) -> Vec<&'a DirectoryUser> {
        let mut missing: Vec<&DirectoryUser> = directory
            .values()
            .map(|user| (self.account_id(&user.identifier), user))
            .filter(|(id, _)| *id != self.service_account && !remote.contains_key(id))
            .map(|(_, user)| user)
            .collect();
        missing.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        missing
    }

    /// Register every directory user missing remotely.
    ///
    /// Returns whether the remote snapshot must be fetched again before
    /// existing accounts are reconciled. Registration failures are recorded
    /// and never abort the pass.
    #[instrument(skip_all)]
    pub async fn create_missing(
        &self,
        directory: &DirectorySnapshot,
        remote: &RemoteSnapshot,
        report: &mut PassReport,
    ) -> bool {
        let mut refetch = false;

        for user in self.missing_accounts(directory, remote) {
            if self.dry_run {
                info!(user = %user.identifier, "[dry run] Would register account");
                report.actions_skipped += 1;
                continue;
            }

            let request = RegistrationRequest::for_directory_user(user);
            match self.api.register(&request).await {
                RemoteOutcome::Success(()) => {
                    info!(user = %user.identifier, "User has been successfully registered");
                    report.accounts_created += 1;
                    refetch = true;
                }
                RemoteOutcome::AlreadyExists => {
                    warn!(user = %user.identifier, "User was registered concurrently");
                    refetch = true;
                }
                other => {
                    error!(
                        user = %user.identifier,
                        "Failed to register user: {}",
                        other.describe()
                    );
                    report.record_failure(&user.identifier, "register", other.describe());
                }
            }
        }

        refetch
    }

    /// Bring every existing remote account of the managed domain in line with
    /// the directory, updating `tombstones` as accounts are deactivated or
    /// reactivated.
    ///
    /// Per-account failures are recorded in `report`. An error is returned
    /// only when no token can be obtained any more; `tombstones` then still
    /// reflects every mutation applied so far.
    #[instrument(skip_all)]
    pub async fn reconcile_existing(
        &self,
        credentials: &mut CredentialManager<A>,
        directory: &DirectorySnapshot,
        remote: &RemoteSnapshot,
        tombstones: &mut TombstoneSet,
        report: &mut PassReport,
    ) -> Result<()> {
        let domain = self.api.server_domain();
        let mut ids: Vec<&AccountId> = remote.keys().collect();
        ids.sort();

        for id in ids {
            let account = &remote[id];
            if !id.domain().eq_ignore_ascii_case(domain) {
                debug!(account = %id, "Skipping account of a foreign domain");
                continue;
            }
            if *id == self.service_account {
                debug!(account = %id, "Skipping the service account");
                continue;
            }

            let directory_user = directory.get(&id.localpart().to_lowercase());
            let action = decide(directory_user, account, tombstones.contains(id));

            match (action, directory_user) {
                (AccountAction::Nothing, _) => {}
                (AccountAction::Deactivate, _) => {
                    self.deactivate(credentials, id, tombstones, report).await?;
                }
                (AccountAction::Reactivate, Some(user)) => {
                    let reactivated = self.reactivate(credentials, id, tombstones, report).await?;
                    let mut current = account.clone();
                    if reactivated || self.dry_run {
                        current.deactivated = false;
                    }
                    let update = AttributeUpdate::between(user, &current);
                    if !update.is_empty() {
                        self.update(credentials, id, &update, report).await?;
                    }
                }
                (AccountAction::Update(update), _) => {
                    self.update(credentials, id, &update, report).await?;
                }
                (AccountAction::Reactivate, None) => {}
            }
        }

        if report.accounts_updated == 0 {
            info!("No changes to attributes; no updates required");
        }
        Ok(())
    }

    async fn deactivate(
        &self,
        credentials: &mut CredentialManager<A>,
        id: &AccountId,
        tombstones: &mut TombstoneSet,
        report: &mut PassReport,
    ) -> Result<()> {
        if self.dry_run {
            info!(account = %id, "[dry run] Would deactivate and erase account");
            report.actions_skipped += 1;
            return Ok(());
        }

        match self.send(credentials, id, Mutation::DeactivateAndErase).await? {
            RemoteOutcome::Success(()) => {
                info!(account = %id, "User has been successfully deactivated");
                tombstones.insert(id.clone());
                report.accounts_deactivated += 1;
                report.tombstones_added += 1;
            }
            other => self.record(id, "deactivate", &other, report),
        }
        Ok(())
    }

    async fn reactivate(
        &self,
        credentials: &mut CredentialManager<A>,
        id: &AccountId,
        tombstones: &mut TombstoneSet,
        report: &mut PassReport,
    ) -> Result<bool> {
        if self.dry_run {
            info!(account = %id, "[dry run] Would reactivate account");
            report.actions_skipped += 1;
            return Ok(false);
        }

        match self.send(credentials, id, Mutation::Reactivate).await? {
            RemoteOutcome::Success(()) => {
                info!(account = %id, "User account has been reactivated");
                tombstones.remove(id);
                report.accounts_reactivated += 1;
                report.tombstones_removed += 1;
                Ok(true)
            }
            other => {
                self.record(id, "reactivate", &other, report);
                Ok(false)
            }
        }
    }

    async fn update(
        &self,
        credentials: &mut CredentialManager<A>,
        id: &AccountId,
        update: &AttributeUpdate,
        report: &mut PassReport,
    ) -> Result<()> {
        if self.dry_run {
            info!(account = %id, keys = ?update.keys(), "[dry run] Would update attributes");
            report.actions_skipped += 1;
            return Ok(());
        }

        match self.send(credentials, id, Mutation::Update(update)).await? {
            RemoteOutcome::Success(()) => {
                info!(account = %id, keys = ?update.keys(), "User data updated successfully");
                report.accounts_updated += 1;
            }
            other => self.record(id, "update", &other, report),
        }
        Ok(())
    }

    fn record(
        &self,
        id: &AccountId,
        operation: &'static str,
        outcome: &RemoteOutcome,
        report: &mut PassReport,
    ) {
        error!(account = %id, operation, "Operation failed: {}", outcome.describe());
        report.record_failure(id.as_str(), operation, outcome.describe());
    }

    /// Issue a mutation, refreshing the token and retrying once if the
    /// current one has expired.
    async fn send(
        &self,
        credentials: &mut CredentialManager<A>,
        id: &AccountId,
        mutation: Mutation<'_>,
    ) -> Result<RemoteOutcome> {
        let token = credentials.get_token().await?;
        let outcome = self.dispatch(&token, id, &mutation).await;
        if !outcome.is_token_expired() {
            return Ok(outcome);
        }

        warn!(
            account = %id,
            operation = mutation.name(),
            "Access token expired; refreshing and retrying once"
        );
        credentials.invalidate();
        let token = credentials.get_token().await?;
        Ok(self.dispatch(&token, id, &mutation).await)
    }

    async fn dispatch(&self, token: &str, id: &AccountId, mutation: &Mutation<'_>) -> RemoteOutcome {
        match mutation {
            Mutation::Update(update) => self.api.update_attributes(token, id, update).await,
            Mutation::DeactivateAndErase => self.api.deactivate_and_erase(token, id).await,
            Mutation::Reactivate => self.api.reactivate(token, id).await,
        }
    }
}
