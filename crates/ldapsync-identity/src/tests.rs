//! Unit tests for ldapsync-identity

use std::collections::HashMap;

use crate::providers::ldap::{directory_user_from_attrs, LdapConfig};

const BASE_DN: &str = "DC=corp,DC=example,DC=org";

fn config() -> LdapConfig {
    LdapConfig {
        server_url: "ldap://dc.corp.example.org:389".to_string(),
        bind_dn: format!("CN=svc-sync,CN=Users,{}", BASE_DN),
        bind_password: "secret".to_string(),
        base_dn: BASE_DN.to_string(),
        user_filter: "(&(objectClass=user)(objectCategory=person))".to_string(),
        start_tls: false,
        admin_groups: None,
    }
}

/// Builds search-entry attributes; repeat a name for multi-valued attributes.
fn entry(pairs: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
    let mut attrs: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in pairs {
        attrs
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
    }
    attrs
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_default_admin_groups_derive_from_base_dn() {
        let groups = config().admin_group_dns();
        assert_eq!(
            groups,
            vec![
                "CN=Domain Admins,CN=Users,DC=corp,DC=example,DC=org".to_string(),
                "CN=Administrators,CN=Builtin,DC=corp,DC=example,DC=org".to_string(),
            ]
        );
    }

    #[test]
    fn test_explicit_admin_groups_win() {
        let mut cfg = config();
        cfg.admin_groups = Some(vec!["CN=Matrix Admins,OU=Groups,DC=corp".to_string()]);
        assert_eq!(cfg.admin_group_dns().len(), 1);
    }

    #[test]
    fn test_config_deserialization_defaults() {
        let json = serde_json::json!({
            "server_url": "ldaps://dc:636",
            "bind_dn": "CN=svc",
            "bind_password": "pw",
            "base_dn": "DC=corp",
            "user_filter": "(objectClass=user)"
        });
        let cfg: LdapConfig = serde_json::from_value(json).unwrap();
        assert!(!cfg.start_tls);
        assert!(cfg.admin_groups.is_none());
    }
}

// =============================================================================
// Entry Conversion Tests
// =============================================================================

#[cfg(test)]
mod entry_conversion_tests {
    use super::*;

    #[test]
    fn test_regular_user() {
        let attrs = entry(&[
            ("sAMAccountName", "JDoe"),
            ("displayName", "John Doe"),
            ("userAccountControl", "512"),
            ("memberOf", "CN=Staff,OU=Groups,DC=corp,DC=example,DC=org"),
        ]);

        let user = directory_user_from_attrs(&attrs, &config().admin_group_dns()).unwrap();
        assert_eq!(user.identifier, "jdoe");
        assert_eq!(user.display_name, "John Doe");
        assert!(!user.admin);
        assert!(!user.deactivated);
    }

    #[test]
    fn test_disabled_bit_marks_deactivated() {
        // 514 = NORMAL_ACCOUNT | ACCOUNTDISABLE
        let attrs = entry(&[
            ("sAMAccountName", "gone"),
            ("displayName", "Gone User"),
            ("userAccountControl", "514"),
        ]);

        let user = directory_user_from_attrs(&attrs, &config().admin_group_dns()).unwrap();
        assert!(user.deactivated);
    }

    #[test]
    fn test_admin_requires_every_admin_group() {
        let groups = config().admin_group_dns();

        let only_domain_admins = entry(&[
            ("sAMAccountName", "half"),
            ("memberOf", "CN=Domain Admins,CN=Users,DC=corp,DC=example,DC=org"),
        ]);
        assert!(!directory_user_from_attrs(&only_domain_admins, &groups).unwrap().admin);

        let both = entry(&[
            ("sAMAccountName", "root"),
            ("memberOf", "CN=Domain Admins,CN=Users,DC=corp,DC=example,DC=org"),
            ("memberOf", "cn=administrators,cn=builtin,dc=corp,dc=example,dc=org"),
        ]);
        assert!(directory_user_from_attrs(&both, &groups).unwrap().admin);
    }

    #[test]
    fn test_missing_display_name_falls_back_to_identifier() {
        let attrs = entry(&[("sAMAccountName", "svc-backup")]);
        let user = directory_user_from_attrs(&attrs, &[]).unwrap();
        assert_eq!(user.display_name, "svc-backup");
        assert!(!user.admin);
        assert!(!user.deactivated);
    }

    #[test]
    fn test_attribute_names_are_case_insensitive() {
        let attrs = entry(&[
            ("samaccountname", "lower"),
            ("DISPLAYNAME", "Lower Case"),
            ("useraccountcontrol", "2"),
        ]);
        let user = directory_user_from_attrs(&attrs, &[]).unwrap();
        assert_eq!(user.identifier, "lower");
        assert_eq!(user.display_name, "Lower Case");
        assert!(user.deactivated);
    }

    #[test]
    fn test_unparsable_account_control_counts_as_active() {
        let attrs = entry(&[
            ("sAMAccountName", "odd"),
            ("userAccountControl", "not-a-number"),
        ]);
        assert!(!directory_user_from_attrs(&attrs, &[]).unwrap().deactivated);
    }

    #[test]
    fn test_entry_without_account_name_is_skipped() {
        let attrs = entry(&[("displayName", "Nameless")]);
        assert!(directory_user_from_attrs(&attrs, &[]).is_none());
    }
}
