//! Domain models shared by the directory, the remote client and the engine

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::ids::AccountId;

// =============================================================================
// Directory Side
// =============================================================================

/// A user as seen by the authoritative directory during one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    /// Lowercased account name; joins against [`AccountId::localpart`].
    pub identifier: String,
    pub display_name: String,
    /// Member of every configured administrative group.
    pub admin: bool,
    /// The account-control "disabled" bit is set.
    pub deactivated: bool,
}

impl DirectoryUser {
    pub fn new(identifier: &str, display_name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.to_lowercase(),
            display_name: display_name.into(),
            admin: false,
            deactivated: false,
        }
    }

    pub fn with_admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }

    pub fn with_deactivated(mut self, deactivated: bool) -> Self {
        self.deactivated = deactivated;
        self
    }
}

/// Directory users keyed by normalized identifier.
pub type DirectorySnapshot = HashMap<String, DirectoryUser>;

// =============================================================================
// Remote Side
// =============================================================================

/// An account as reported by the remote account system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAccount {
    pub id: AccountId,
    /// Empty when the remote system has no display name on record.
    pub display_name: String,
    pub admin: bool,
    pub deactivated: bool,
}

/// Remote accounts keyed by fully-qualified id.
pub type RemoteSnapshot = HashMap<AccountId, RemoteAccount>;

/// One page of the remote account listing.
#[derive(Debug, Clone, Default)]
pub struct AccountPage {
    pub accounts: Vec<RemoteAccount>,
    /// Cursor for the next page; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// Set of account ids the engine itself deactivated.
pub type TombstoneSet = BTreeSet<AccountId>;

// =============================================================================
// Mutations
// =============================================================================

/// Partial attribute update. Absent fields are left untouched remotely and
/// are not serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<bool>,
}

impl AttributeUpdate {
    /// The attributes whose directory value differs from the remote one,
    /// carrying the directory value.
    pub fn between(directory: &DirectoryUser, remote: &RemoteAccount) -> Self {
        Self {
            displayname: (directory.display_name != remote.display_name)
                .then(|| directory.display_name.clone()),
            admin: (directory.admin != remote.admin).then_some(directory.admin),
            deactivated: (directory.deactivated != remote.deactivated)
                .then_some(directory.deactivated),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.displayname.is_none() && self.admin.is_none() && self.deactivated.is_none()
    }

    /// Names of the attributes carried by this update, for logging.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.displayname.is_some() {
            keys.push("displayname");
        }
        if self.admin.is_some() {
            keys.push("admin");
        }
        if self.deactivated.is_some() {
            keys.push("deactivated");
        }
        keys
    }
}

/// Parameters of an account registration.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub localpart: String,
    pub display_name: String,
    pub password: String,
    pub admin: bool,
}

impl RegistrationRequest {
    /// Registration for a directory user. The password stays empty; the remote
    /// system is expected to use SSO or an out-of-band reset.
    pub fn for_directory_user(user: &DirectoryUser) -> Self {
        Self {
            localpart: user.identifier.clone(),
            display_name: user.display_name.clone(),
            password: String::new(),
            admin: user.admin,
        }
    }
}
