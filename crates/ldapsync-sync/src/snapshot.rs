//! Remote account snapshot assembly

use tracing::{info, instrument, warn};

use ldapsync_core::{AccountApi, RemoteOutcome, RemoteSnapshot, Result, SyncError};

use crate::credentials::CredentialManager;

/// Consecutive expiry signals tolerated on one page before giving up.
const MAX_CONSECUTIVE_EXPIRIES: u32 = 3;

/// Page through the remote account listing and collect every account.
///
/// A token-expiry answer refreshes the credentials and re-requests the same
/// page; pages already collected are kept.
#[instrument(skip_all)]
pub async fn fetch_remote_snapshot<A: AccountApi + ?Sized>(
    api: &A,
    credentials: &mut CredentialManager<A>,
) -> Result<RemoteSnapshot> {
    let mut snapshot = RemoteSnapshot::new();
    let mut cursor: Option<String> = None;
    let mut expiries = 0;

    loop {
        let token = credentials.get_token().await?;

        match api.list_accounts(&token, cursor.as_deref()).await {
            RemoteOutcome::Success(page) => {
                expiries = 0;
                for account in page.accounts {
                    snapshot.insert(account.id.clone(), account);
                }
                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
            RemoteOutcome::TokenExpired => {
                expiries += 1;
                if expiries > MAX_CONSECUTIVE_EXPIRIES {
                    return Err(SyncError::auth(
                        "Freshly issued access tokens keep being rejected",
                    ));
                }
                warn!(
                    cursor = cursor.as_deref().unwrap_or("<start>"),
                    "Access token expired while listing accounts; refreshing"
                );
                credentials.invalidate();
            }
            other => {
                return Err(SyncError::remote(format!(
                    "The attempt to retrieve registered users has failed: {}",
                    other.describe()
                )));
            }
        }
    }

    info!("Retrieved {} registered accounts", snapshot.len());
    Ok(snapshot)
}
