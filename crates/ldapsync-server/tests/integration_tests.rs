//! Live tests against a running homeserver and directory
//!
//! These tests need a Synapse instance with registration via shared secret
//! enabled and, for the directory tests, a reachable LDAP server:
//! - LDAPSYNC_TEST_SYNAPSE_URL: homeserver base URL (default: http://localhost:8008)
//! - LDAPSYNC_TEST_DOMAIN: server name (default: localhost)
//! - LDAPSYNC_TEST_SHARED_SECRET: `registration_shared_secret`
//! - LDAPSYNC_TEST_LDAP_URL, LDAPSYNC_TEST_BIND_DN, LDAPSYNC_TEST_BIND_PASSWORD,
//!   LDAPSYNC_TEST_BASE_DN: directory connection
//!
//! Run with: cargo test --test integration_tests -- --ignored

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use ldapsync_core::{
    AccountApi, AccountId, AttributeUpdate, DirectorySource, RegistrationRequest, RemoteOutcome,
};
use ldapsync_identity::{LdapConfig, LdapDirectory};
use ldapsync_synapse::{SynapseClient, SynapseConfig};
use ldapsync_sync::{fetch_remote_snapshot, CredentialManager, ServiceAccount};

// =============================================================================
// Test Fixtures
// =============================================================================

/// Creates a unique localpart to avoid conflicts between test runs
fn test_localpart(label: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis();
    format!("ldapsync_{}_{}", label, timestamp)
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Synapse client from the environment, or `None` when no shared secret is set
fn synapse_client() -> Option<Arc<SynapseClient>> {
    let shared_secret = std::env::var("LDAPSYNC_TEST_SHARED_SECRET").ok()?;
    let config = SynapseConfig {
        server_url: env_or("LDAPSYNC_TEST_SYNAPSE_URL", "http://localhost:8008"),
        domain: env_or("LDAPSYNC_TEST_DOMAIN", "localhost"),
        shared_secret,
        request_timeout_secs: 10,
        device_display_name: "ldapsync integration tests".to_string(),
    };
    Some(Arc::new(SynapseClient::new(config).unwrap()))
}

fn service_account() -> ServiceAccount {
    ServiceAccount {
        username: env_or("LDAPSYNC_TEST_ADMIN", "ldapsync_test_admin"),
        password: env_or("LDAPSYNC_TEST_ADMIN_PASSWORD", "ldapsync-test-password"),
    }
}

// =============================================================================
// Homeserver Tests
// =============================================================================

#[tokio::test]
#[ignore = "Requires running Synapse instance"]
async fn test_service_account_bootstrap_and_login() {
    let Some(api) = synapse_client() else {
        eprintln!("Skipping: LDAPSYNC_TEST_SHARED_SECRET not set");
        return;
    };

    let mut credentials =
        CredentialManager::new(Arc::clone(&api), service_account(), CancellationToken::new());
    let token = credentials.get_token().await.unwrap();

    assert!(!token.is_empty());
    assert!(credentials.is_bootstrapped());
}

#[tokio::test]
#[ignore = "Requires running Synapse instance"]
async fn test_account_lifecycle() {
    let Some(api) = synapse_client() else {
        return;
    };
    let mut credentials =
        CredentialManager::new(Arc::clone(&api), service_account(), CancellationToken::new());
    let token = credentials.get_token().await.unwrap();

    let localpart = test_localpart("lifecycle");
    let id = AccountId::new(&localpart, api.server_domain());
    let request = RegistrationRequest {
        localpart: localpart.clone(),
        display_name: "Lifecycle Test".to_string(),
        password: "initial-password".to_string(),
        admin: false,
    };

    assert_eq!(api.register(&request).await, RemoteOutcome::Success(()));
    assert_eq!(api.register(&request).await, RemoteOutcome::AlreadyExists);

    let snapshot = fetch_remote_snapshot(api.as_ref(), &mut credentials)
        .await
        .unwrap();
    let account = snapshot.get(&id).expect("registered account is listed");
    assert_eq!(account.display_name, "Lifecycle Test");
    assert!(!account.deactivated);

    let update = AttributeUpdate {
        displayname: Some("Renamed".to_string()),
        ..Default::default()
    };
    assert!(api.update_attributes(&token, &id, &update).await.is_success());

    assert!(api.deactivate_and_erase(&token, &id).await.is_success());
    assert!(api.reactivate(&token, &id).await.is_success());

    let snapshot = fetch_remote_snapshot(api.as_ref(), &mut credentials)
        .await
        .unwrap();
    assert!(!snapshot[&id].deactivated);
}

#[tokio::test]
#[ignore = "Requires running Synapse instance"]
async fn test_bogus_token_is_reported_as_expired() {
    let Some(api) = synapse_client() else {
        return;
    };

    let outcome = api.list_accounts("syt_not_a_real_token", None).await;

    assert!(outcome.is_token_expired());
}

// =============================================================================
// Directory Tests
// =============================================================================

#[tokio::test]
#[ignore = "Requires running LDAP server"]
async fn test_directory_fetch() {
    let Ok(server_url) = std::env::var("LDAPSYNC_TEST_LDAP_URL") else {
        eprintln!("Skipping: LDAPSYNC_TEST_LDAP_URL not set");
        return;
    };

    let directory = LdapDirectory::new(LdapConfig {
        server_url,
        bind_dn: env_or("LDAPSYNC_TEST_BIND_DN", ""),
        bind_password: env_or("LDAPSYNC_TEST_BIND_PASSWORD", ""),
        base_dn: env_or("LDAPSYNC_TEST_BASE_DN", ""),
        user_filter: env_or(
            "LDAPSYNC_TEST_FILTER",
            "(&(objectClass=user)(objectCategory=person))",
        ),
        start_tls: false,
        admin_groups: None,
    });

    let users = directory.fetch_users().await.unwrap();

    assert!(!users.is_empty());
    for (key, user) in &users {
        assert_eq!(key, &user.identifier);
        assert_eq!(user.identifier, user.identifier.to_lowercase());
    }
}
