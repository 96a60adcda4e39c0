//! Daemon configuration

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use ldapsync_core::SyncError;
use ldapsync_identity::LdapConfig;
use ldapsync_synapse::SynapseConfig;
use ldapsync_sync::ServiceAccount;

/// Configuration file looked up when no path is given.
const DEFAULT_CONFIG: &str = "config/ldapsync";

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub ldap: LdapConfig,
    pub synapse: SynapseConfig,
    pub service_account: ServiceAccount,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
    #[serde(default = "default_tombstone_path")]
    pub tombstone_path: PathBuf,
    #[serde(default)]
    pub dry_run: bool,
}

/// One year.
const MAX_INTERVAL_HOURS: u64 = 24 * 365;

fn default_interval_hours() -> u64 {
    1
}

fn default_tombstone_path() -> PathBuf {
    PathBuf::from("deleted_users_list")
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_hours: default_interval_hours(),
            tombstone_path: default_tombstone_path(),
            dry_run: false,
        }
    }
}

impl Settings {
    /// Load settings from defaults, the configuration file, `config/local` and
    /// `LDAPSYNC__*` environment variables, in increasing precedence.
    ///
    /// An explicitly given file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG).required(false),
        };

        let config = config::Config::builder()
            .set_default("ldap.start_tls", false)?
            .set_default("synapse.request_timeout_secs", 30)?
            .set_default("sync.interval_hours", 1)?
            .set_default("sync.tombstone_path", "deleted_users_list")?
            .set_default("sync.dry_run", false)?
            .add_source(file)
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("LDAPSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ldapsync_core::Result<()> {
        if self.sync.interval_hours == 0 {
            return Err(SyncError::config("sync.interval_hours must be at least 1"));
        }
        if self.sync.interval_hours > MAX_INTERVAL_HOURS {
            return Err(SyncError::config(format!(
                "sync.interval_hours must not exceed {}",
                MAX_INTERVAL_HOURS
            )));
        }
        if self.synapse.domain.trim().is_empty() {
            return Err(SyncError::config("synapse.domain must not be empty"));
        }
        if self.synapse.shared_secret.is_empty() {
            return Err(SyncError::config("synapse.shared_secret must not be empty"));
        }
        if self.service_account.username.trim().is_empty() {
            return Err(SyncError::config(
                "service_account.username must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
[ldap]
server_url = "ldap://dc.example.org:389"
bind_dn = "CN=svc,CN=Users,DC=example,DC=org"
bind_password = "ldap-secret"
base_dn = "DC=example,DC=org"
user_filter = "(objectClass=user)"

[synapse]
server_url = "https://matrix.example.org"
domain = "example.org"
shared_secret = "registration-secret"

[service_account]
username = "ldapsync"
password = "hunter2"

[sync]
interval_hours = 4
tombstone_path = "/var/lib/ldapsync/deleted_users_list"
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_explicit_file() {
        let file = write_config(FULL);

        let settings = Settings::load(Some(file.path())).unwrap();

        assert_eq!(settings.synapse.domain, "example.org");
        assert_eq!(settings.synapse.request_timeout_secs, 30);
        assert_eq!(settings.synapse.device_display_name, "Synapse Server Internal");
        assert!(!settings.ldap.start_tls);
        assert_eq!(settings.sync.interval_hours, 4);
        assert_eq!(
            settings.sync.tombstone_path,
            PathBuf::from("/var/lib/ldapsync/deleted_users_list")
        );
        assert!(!settings.sync.dry_run);
        assert_eq!(settings.service_account.username, "ldapsync");
    }

    #[test]
    fn test_sync_section_is_optional() {
        let without_sync = FULL.split("[sync]").next().unwrap();
        let file = write_config(without_sync);

        let settings = Settings::load(Some(file.path())).unwrap();

        assert_eq!(settings.sync.interval_hours, 1);
        assert_eq!(settings.sync.tombstone_path, PathBuf::from("deleted_users_list"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let file = write_config(&FULL.replace("interval_hours = 4", "interval_hours = 0"));

        let err = Settings::load(Some(file.path())).unwrap_err();

        assert!(err.to_string().contains("interval_hours"));
    }

    #[test]
    fn test_oversized_interval_is_rejected() {
        let file = write_config(&FULL.replace(
            "interval_hours = 4",
            "interval_hours = 9000",
        ));

        let err = Settings::load(Some(file.path())).unwrap_err();

        assert!(err.to_string().contains("interval_hours"));
    }

    #[test]
    fn test_empty_shared_secret_is_rejected() {
        let file = write_config(&FULL.replace(
            "shared_secret = \"registration-secret\"",
            "shared_secret = \"\"",
        ));

        assert!(Settings::load(Some(file.path())).is_err());
    }
}
