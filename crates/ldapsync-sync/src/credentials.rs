//! Service-account bootstrap and bearer-token lifecycle
//!
//! The [`CredentialManager`] owns the only token the process uses. A valid
//! token is reused without any network call; once a caller reports expiry
//! through [`CredentialManager::invalidate`], the next
//! [`CredentialManager::get_token`] logs in again.

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use ldapsync_core::{AccountApi, RegistrationRequest, RemoteOutcome, Result, SyncError};

/// The privileged account used for every admin call.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Retry behaviour of bootstrap and login.
#[derive(Debug, Clone)]
pub struct CredentialPolicy {
    /// Registration attempts before the pass is aborted.
    pub bootstrap_attempts: u32,
    /// Fixed delay between registration attempts.
    pub bootstrap_backoff: Duration,
    /// Fixed delay between login attempts. Login is retried without bound.
    pub login_backoff: Duration,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            bootstrap_attempts: 10,
            bootstrap_backoff: Duration::from_secs(6),
            login_backoff: Duration::from_secs(10),
        }
    }
}

/// The current bearer token and whether it may still be used.
#[derive(Debug, Clone, Default)]
pub struct CredentialSession {
    token: Option<String>,
    valid: bool,
}

impl CredentialSession {
    /// The token, if one is held and still marked valid.
    pub fn current(&self) -> Option<&str> {
        match (&self.token, self.valid) {
            (Some(token), true) => Some(token),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.current().is_some()
    }

    fn establish(&mut self, token: String) {
        self.token = Some(token);
        self.valid = true;
    }

    fn invalidate(&mut self) {
        self.valid = false;
    }
}

pub struct CredentialManager<A: AccountApi + ?Sized> {
    api: Arc<A>,
    account: ServiceAccount,
    policy: CredentialPolicy,
    session: CredentialSession,
    bootstrapped: bool,
    cancel: CancellationToken,
}

impl<A: AccountApi + ?Sized> CredentialManager<A> {
    pub fn new(api: Arc<A>, account: ServiceAccount, cancel: CancellationToken) -> Self {
        Self::with_policy(api, account, CredentialPolicy::default(), cancel)
    }

    pub fn with_policy(
        api: Arc<A>,
        account: ServiceAccount,
        policy: CredentialPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            account,
            policy,
            session: CredentialSession::default(),
            bootstrapped: false,
            cancel,
        }
    }

    pub fn username(&self) -> &str {
        &self.account.username
    }

    pub fn session(&self) -> &CredentialSession {
        &self.session
    }

    /// Whether the service account is known to exist remotely.
    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    /// Mark the current token as expired.
    pub fn invalidate(&mut self) {
        if self.session.is_valid() {
            debug!("Access token marked as expired");
        }
        self.session.invalidate();
    }

    /// Return a usable bearer token, registering the service account and
    /// logging in as needed.
    ///
    /// Fails only when bootstrap registration is exhausted or the manager
    /// is cancelled; login itself is retried until it succeeds.
    #[instrument(skip(self), fields(user = %self.account.username))]
    pub async fn get_token(&mut self) -> Result<String> {
        if let Some(token) = self.session.current() {
            debug!("A previously retrieved valid access token is being reused");
            return Ok(token.to_string());
        }

        if self.session.token.is_some() {
            info!("Access token has expired; attempting to refetch access token");
        }

        if !self.bootstrapped {
            self.bootstrap().await?;
        }

        let token = self.acquire_token().await?;
        self.session.establish(token.clone());
        Ok(token)
    }

    async fn bootstrap(&mut self) -> Result<()> {
        info!("Attempting to register the service account");

        let request = RegistrationRequest {
            localpart: self.account.username.clone(),
            display_name: self.account.username.clone(),
            password: self.account.password.clone(),
            admin: true,
        };

        let attempts = self.policy.bootstrap_attempts;
        for attempt in 1..=attempts {
            match self.api.register(&request).await {
                RemoteOutcome::Success(()) => {
                    info!("Service account has been registered");
                    self.bootstrapped = true;
                    return Ok(());
                }
                RemoteOutcome::AlreadyExists => {
                    info!("Service account is registered already");
                    self.bootstrapped = true;
                    return Ok(());
                }
                other => {
                    error!(
                        attempt,
                        "Failed to register service account: {}", other.describe()
                    );
                    if attempt < attempts {
                        self.pause(self.policy.bootstrap_backoff).await?;
                    }
                }
            }
        }

        Err(SyncError::BootstrapExhausted { attempts })
    }

    async fn acquire_token(&self) -> Result<String> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(SyncError::Cancelled),
                outcome = self.api.login(&self.account.username, &self.account.password) => outcome,
            };

            match outcome {
                RemoteOutcome::Success(token) => {
                    info!("The access token has been retrieved");
                    return Ok(token);
                }
                other => {
                    error!(
                        "The attempt to retrieve the access token has failed: {}. Retrying",
                        other.describe()
                    );
                    self.pause(self.policy.login_backoff).await?;
                }
            }
        }
    }

    async fn pause(&self, delay: Duration) -> Result<()> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(SyncError::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
