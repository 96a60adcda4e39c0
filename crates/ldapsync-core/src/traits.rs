//! Collaborator traits consumed by the reconciliation core

use crate::{error::Result, ids::AccountId, models::*, outcome::RemoteOutcome};
use async_trait::async_trait;

// =============================================================================
// Directory
// =============================================================================

/// Source of the authoritative user list.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Fetch every directory user matching the configured filter, keyed by
    /// lowercased identifier. Any failure is fatal to the pass.
    async fn fetch_users(&self) -> Result<DirectorySnapshot>;
}

// =============================================================================
// Remote Account System
// =============================================================================

/// Admin operations on the remote account system.
///
/// Every call reports its result as a [`RemoteOutcome`]; only programming
/// errors would be worth a panic, and none are expected here.
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// The domain part of account ids managed by this server.
    fn server_domain(&self) -> &str;

    /// Register an account using a freshly issued nonce.
    async fn register(&self, request: &RegistrationRequest) -> RemoteOutcome;

    /// Password login; yields a bearer token.
    async fn login(&self, username: &str, password: &str) -> RemoteOutcome<String>;

    /// One page of non-guest accounts, deactivated ones included.
    async fn list_accounts(&self, token: &str, cursor: Option<&str>)
        -> RemoteOutcome<AccountPage>;

    /// Partial attribute update.
    async fn update_attributes(
        &self,
        token: &str,
        account: &AccountId,
        update: &AttributeUpdate,
    ) -> RemoteOutcome;

    /// Best-effort media deletion followed by deactivation with erasure.
    async fn deactivate_and_erase(&self, token: &str, account: &AccountId) -> RemoteOutcome;

    /// Reverse a deactivation.
    async fn reactivate(&self, token: &str, account: &AccountId) -> RemoteOutcome;
}

// =============================================================================
// Tombstones
// =============================================================================

/// Durable storage for the tombstone set.
#[async_trait]
pub trait TombstoneStore: Send + Sync {
    /// Load the persisted set. A store that was never written yields an empty set.
    async fn load(&self) -> Result<TombstoneSet>;

    /// Replace the persisted set with `tombstones`.
    async fn save(&self, tombstones: &TombstoneSet) -> Result<()>;
}
