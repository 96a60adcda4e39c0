//! LDAP / Active Directory provider implementation
//!
//! This provider:
//! - Binds with a service account
//! - Runs one subtree search per pass for the configured user filter
//! - Derives privilege from membership in administrative groups
//! - Derives deactivation from the `userAccountControl` bitmask
//!
//! The network half requires the `ldap` feature; entry conversion does not.

#[cfg(feature = "ldap")]
use ldap3::{LdapConnAsync, Scope, SearchEntry};

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

use ldapsync_core::{DirectorySnapshot, DirectorySource, DirectoryUser, Result, SyncError};

/// `userAccountControl` flag marking a disabled account.
pub const ACCOUNT_DISABLE: u32 = 0x2;

pub const ATTR_ACCOUNT_NAME: &str = "sAMAccountName";
pub const ATTR_DISPLAY_NAME: &str = "displayName";
pub const ATTR_ACCOUNT_CONTROL: &str = "userAccountControl";
pub const ATTR_MEMBER_OF: &str = "memberOf";

/// Connection and search settings for the directory.
#[derive(Debug, Clone, Deserialize)]
pub struct LdapConfig {
    pub server_url: String,
    pub bind_dn: String,
    pub bind_password: String,
    pub base_dn: String,
    pub user_filter: String,
    #[serde(default)]
    pub start_tls: bool,
    /// Groups a user must belong to (all of them) to be privileged.
    /// Defaults to the built-in Active Directory administrator groups.
    #[serde(default)]
    pub admin_groups: Option<Vec<String>>,
}

impl LdapConfig {
    pub fn admin_group_dns(&self) -> Vec<String> {
        match &self.admin_groups {
            Some(groups) => groups.clone(),
            None => vec![
                format!("CN=Domain Admins,CN=Users,{}", self.base_dn),
                format!("CN=Administrators,CN=Builtin,{}", self.base_dn),
            ],
        }
    }
}

/// LDAP / Active Directory user source
pub struct LdapDirectory {
    config: LdapConfig,
    admin_groups: Vec<String>,
}

impl LdapDirectory {
    pub fn new(config: LdapConfig) -> Self {
        let admin_groups = config.admin_group_dns();
        Self {
            config,
            admin_groups,
        }
    }

    #[cfg(feature = "ldap")]
    async fn connect(&self) -> Result<ldap3::Ldap> {
        use ldap3::LdapConnSettings;

        let settings = LdapConnSettings::new().set_starttls(self.config.start_tls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.config.server_url)
            .await
            .map_err(|e| SyncError::directory(format!("LDAP connection failed: {}", e)))?;

        ldap3::drive!(conn);

        ldap.simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await
            .and_then(|res| res.success())
            .map_err(|e| SyncError::directory(format!("LDAP bind failed: {}", e)))?;

        Ok(ldap)
    }
}

#[async_trait]
impl DirectorySource for LdapDirectory {
    #[instrument(skip(self), fields(server = %self.config.server_url))]
    async fn fetch_users(&self) -> Result<DirectorySnapshot> {
        #[cfg(feature = "ldap")]
        {
            let mut ldap = self.connect().await?;

            let (rs, _result) = ldap
                .search(
                    &self.config.base_dn,
                    Scope::Subtree,
                    &self.config.user_filter,
                    vec![
                        ATTR_ACCOUNT_NAME,
                        ATTR_DISPLAY_NAME,
                        ATTR_ACCOUNT_CONTROL,
                        ATTR_MEMBER_OF,
                    ],
                )
                .await
                .map_err(|e| SyncError::directory(format!("LDAP search failed: {}", e)))?
                .success()
                .map_err(|e| SyncError::directory(format!("LDAP search failed: {}", e)))?;

            let mut users = DirectorySnapshot::new();
            for entry in rs {
                let se = SearchEntry::construct(entry);
                match directory_user_from_attrs(&se.attrs, &self.admin_groups) {
                    Some(user) => {
                        users.insert(user.identifier.clone(), user);
                    }
                    None => warn!(dn = %se.dn, "Skipping directory entry without an account name"),
                }
            }

            ldap.unbind().await.ok();

            info!("LDAP user data has been retrieved ({} users)", users.len());
            Ok(users)
        }

        #[cfg(not(feature = "ldap"))]
        {
            Err(SyncError::config(
                "LDAP support not enabled. Compile with --features ldap",
            ))
        }
    }
}

/// Case-insensitive attribute lookup; directories disagree on the casing
/// of attribute names in search results.
fn attr_values<'a>(attrs: &'a HashMap<String, Vec<String>>, name: &str) -> Option<&'a [String]> {
    attrs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, values)| values.as_slice())
}

fn first_attr<'a>(attrs: &'a HashMap<String, Vec<String>>, name: &str) -> Option<&'a str> {
    attr_values(attrs, name)?
        .first()
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

/// Convert the attributes of one search entry into a [`DirectoryUser`].
///
/// Returns `None` when the entry has no account name.
pub fn directory_user_from_attrs(
    attrs: &HashMap<String, Vec<String>>,
    admin_groups: &[String],
) -> Option<DirectoryUser> {
    let identifier = first_attr(attrs, ATTR_ACCOUNT_NAME)?.to_lowercase();

    let display_name = first_attr(attrs, ATTR_DISPLAY_NAME)
        .map(str::to_string)
        .unwrap_or_else(|| identifier.clone());

    let deactivated = match first_attr(attrs, ATTR_ACCOUNT_CONTROL) {
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(flags) => flags & ACCOUNT_DISABLE == ACCOUNT_DISABLE,
            Err(_) => {
                debug!(user = %identifier, value = raw, "Unparsable userAccountControl");
                false
            }
        },
        None => false,
    };

    let member_of = attr_values(attrs, ATTR_MEMBER_OF).unwrap_or(&[]);
    let admin = !admin_groups.is_empty()
        && admin_groups.iter().all(|group| {
            member_of
                .iter()
                .any(|membership| membership.eq_ignore_ascii_case(group))
        });

    Some(DirectoryUser {
        identifier,
        display_name,
        admin,
        deactivated,
    })
}
