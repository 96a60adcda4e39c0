//! Synapse admin API client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use ldapsync_core::{
    AccountApi, AccountId, AccountPage, AttributeUpdate, RegistrationRequest, RemoteOutcome,
    RemoteRejection, Result, SyncError,
};

use crate::dto::*;
use crate::mac::registration_mac;

/// Page size requested from the account listing.
pub const PAGE_SIZE: u32 = 100;

/// Connection settings for the homeserver.
#[derive(Debug, Clone, Deserialize)]
pub struct SynapseConfig {
    /// Base URL of the homeserver, e.g. `https://matrix.example.org`.
    pub server_url: String,
    /// Server name used in account ids (`@user:<domain>`).
    pub domain: String,
    /// `registration_shared_secret` from the homeserver configuration.
    pub shared_secret: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_device_display_name")]
    pub device_display_name: String,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_device_display_name() -> String {
    "Synapse Server Internal".to_string()
}

/// [`AccountApi`] implementation over the Synapse admin API.
#[derive(Clone)]
pub struct SynapseClient {
    client: Client,
    base_url: String,
    domain: String,
    shared_secret: String,
    device_display_name: String,
}

impl SynapseClient {
    pub fn new(config: SynapseConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            domain: config.domain,
            shared_secret: config.shared_secret,
            device_display_name: config.device_display_name,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn user_url(&self, prefix: &str, account: &AccountId, suffix: &str) -> String {
        format!(
            "{}{}{}{}",
            self.base_url,
            prefix,
            urlencoding::encode(account.as_str()),
            suffix
        )
    }

    /// Send a request and classify the answer. A successful response body is
    /// returned as JSON (`Null` when empty).
    async fn execute(&self, request: RequestBuilder) -> RemoteOutcome<serde_json::Value> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return RemoteOutcome::Transient(e.to_string()),
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return RemoteOutcome::Transient(format!("HTTP {}: {}", status, e)),
        };

        if status.is_success() {
            if body.is_empty() {
                return RemoteOutcome::Success(serde_json::Value::Null);
            }
            return match serde_json::from_slice(&body) {
                Ok(value) => RemoteOutcome::Success(value),
                Err(e) => RemoteOutcome::Transient(format!("Malformed response body: {}", e)),
            };
        }

        classify_error(status.as_u16(), &body)
    }

    async fn execute_as<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteOutcome<T> {
        self.execute(request)
            .await
            .and_then(|value| match serde_json::from_value(value) {
                Ok(parsed) => RemoteOutcome::Success(parsed),
                Err(e) => RemoteOutcome::Transient(format!("Unexpected response body: {}", e)),
            })
    }

    async fn fetch_nonce(&self) -> RemoteOutcome<String> {
        self.execute_as::<NonceResponse>(self.client.get(self.url("/_synapse/admin/v1/register")))
            .await
            .map(|r| r.nonce)
    }

    async fn delete_media(&self, token: &str, account: &AccountId) -> RemoteOutcome {
        let request = self
            .client
            .delete(self.user_url("/_synapse/admin/v1/users/", account, "/media"))
            .bearer_auth(token);
        self.execute(request).await.map(|_| ())
    }

    async fn deactivate(&self, token: &str, account: &AccountId, erase: bool) -> RemoteOutcome {
        let request = self
            .client
            .post(self.user_url("/_synapse/admin/v1/deactivate/", account, ""))
            .bearer_auth(token)
            .json(&DeactivateBody { erase });
        self.execute(request).await.map(|_| ())
    }
}

/// Map a non-2xx answer to an outcome.
pub fn classify_error<T>(status: u16, body: &[u8]) -> RemoteOutcome<T> {
    let parsed: ErrorBody = match serde_json::from_slice(body) {
        Ok(parsed) => parsed,
        Err(_) => return RemoteOutcome::Transient(format!("HTTP {}", status)),
    };

    if parsed.errcode.as_deref() == Some(ERRCODE_USER_IN_USE) {
        return RemoteOutcome::AlreadyExists;
    }

    if parsed.errcode.as_deref() == Some(ERRCODE_UNKNOWN_TOKEN)
        || parsed.error.as_deref() == Some(ERROR_TOKEN_EXPIRED)
    {
        return RemoteOutcome::TokenExpired;
    }

    if parsed.errcode.is_none() && parsed.error.is_none() {
        return RemoteOutcome::Transient(format!("HTTP {}", status));
    }

    RemoteOutcome::Rejected(RemoteRejection {
        status,
        errcode: parsed.errcode,
        error: parsed.error,
    })
}

#[async_trait]
impl AccountApi for SynapseClient {
    fn server_domain(&self) -> &str {
        &self.domain
    }

    #[instrument(skip(self, request), fields(user = %request.localpart))]
    async fn register(&self, request: &RegistrationRequest) -> RemoteOutcome {
        let nonce = match self.fetch_nonce().await {
            RemoteOutcome::Success(nonce) => nonce,
            other => {
                error!("Failed to retrieve a nonce for registration: {}", other.describe());
                return other.map(|_| ());
            }
        };

        let mac = match registration_mac(
            &self.shared_secret,
            &nonce,
            &request.localpart,
            &request.password,
            request.admin,
        ) {
            Ok(mac) => mac,
            Err(e) => return RemoteOutcome::Transient(e.to_string()),
        };

        let body = RegisterBody {
            nonce: &nonce,
            username: &request.localpart,
            displayname: &request.display_name,
            password: &request.password,
            admin: request.admin,
            mac: &mac,
        };

        let outcome = self
            .execute(self.client.post(self.url("/_synapse/admin/v1/register")).json(&body))
            .await
            .map(|_| ());

        match &outcome {
            RemoteOutcome::Success(()) => info!("User '{}' was registered", request.localpart),
            RemoteOutcome::AlreadyExists => {
                debug!("User '{}' is registered already", request.localpart)
            }
            other => error!(
                "Failed to register user '{}': {}",
                request.localpart,
                other.describe()
            ),
        }
        outcome
    }

    #[instrument(skip(self, password))]
    async fn login(&self, username: &str, password: &str) -> RemoteOutcome<String> {
        let body = LoginBody::password(username, password, &self.device_display_name);
        let request = self.client.post(self.url("/_matrix/client/v3/login")).json(&body);

        self.execute(request).await.and_then(|value| {
            let token = serde_json::from_value::<LoginResponse>(value.clone())
                .ok()
                .and_then(|r| r.access_token)
                .filter(|t| !t.is_empty());
            match token {
                Some(token) => RemoteOutcome::Success(token),
                None => {
                    let err: ErrorBody = serde_json::from_value(value).unwrap_or_default();
                    RemoteOutcome::Rejected(RemoteRejection {
                        status: 200,
                        errcode: err.errcode,
                        error: err
                            .error
                            .or_else(|| Some("login response carried no access token".into())),
                    })
                }
            }
        })
    }

    #[instrument(skip(self, token))]
    async fn list_accounts(&self, token: &str, cursor: Option<&str>) -> RemoteOutcome<AccountPage> {
        let mut request = self
            .client
            .get(self.url("/_synapse/admin/v2/users"))
            .bearer_auth(token)
            .query(&[
                ("limit", PAGE_SIZE.to_string()),
                ("guests", "false".to_string()),
                ("deactivated", "true".to_string()),
            ]);
        if let Some(cursor) = cursor {
            request = request.query(&[("from", cursor)]);
        }

        self.execute_as::<UsersPage>(request).await.map(|page| {
            let next_cursor = page.next_cursor();
            let accounts = page
                .users
                .into_iter()
                .filter_map(|entry| {
                    let name = entry.name.clone();
                    let account = entry.into_account();
                    if account.is_none() {
                        warn!("Ignoring remote account with malformed id '{}'", name);
                    }
                    account
                })
                .collect();
            AccountPage {
                accounts,
                next_cursor,
            }
        })
    }

    #[instrument(skip(self, token, update), fields(account = %account))]
    async fn update_attributes(
        &self,
        token: &str,
        account: &AccountId,
        update: &AttributeUpdate,
    ) -> RemoteOutcome {
        let request = self
            .client
            .put(self.user_url("/_synapse/admin/v2/users/", account, ""))
            .bearer_auth(token)
            .json(update);
        self.execute(request).await.map(|_| ())
    }

    #[instrument(skip(self, token), fields(account = %account))]
    async fn deactivate_and_erase(&self, token: &str, account: &AccountId) -> RemoteOutcome {
        match self.delete_media(token, account).await {
            RemoteOutcome::Success(()) => info!("Media has been deleted for '{}'", account),
            RemoteOutcome::TokenExpired => return RemoteOutcome::TokenExpired,
            other => warn!(
                "The deletion of media for '{}' has failed: {}",
                account,
                other.describe()
            ),
        }

        self.deactivate(token, account, true).await
    }

    #[instrument(skip(self, token), fields(account = %account))]
    async fn reactivate(&self, token: &str, account: &AccountId) -> RemoteOutcome {
        self.deactivate(token, account, false).await
    }
}
