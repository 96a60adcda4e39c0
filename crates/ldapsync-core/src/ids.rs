//! Strongly-typed account identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SyncError;

/// A fully-qualified remote account id of the form `@localpart:domain`.
///
/// The localpart is everything between the leading `@` and the first `:`;
/// the domain is everything after it (it may itself contain a port).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Builds the account id for a directory identifier on `domain`.
    /// The localpart is lowercased so it joins against normalized identifiers.
    pub fn new(localpart: &str, domain: &str) -> Self {
        Self(format!("@{}:{}", localpart.to_lowercase(), domain))
    }

    /// Parse an id as returned by the remote system.
    pub fn parse(s: &str) -> Result<Self, SyncError> {
        let rest = s
            .strip_prefix('@')
            .ok_or_else(|| SyncError::internal(format!("Account id '{}' lacks '@' sigil", s)))?;

        match rest.split_once(':') {
            Some((localpart, domain)) if !localpart.is_empty() && !domain.is_empty() => {
                Ok(Self(s.to_string()))
            }
            _ => Err(SyncError::internal(format!(
                "Account id '{}' is not of the form @localpart:domain",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The join key against directory identifiers.
    pub fn localpart(&self) -> &str {
        let rest = &self.0[1..];
        match rest.find(':') {
            Some(idx) => &rest[..idx],
            None => rest,
        }
    }

    pub fn domain(&self) -> &str {
        match self.0.find(':') {
            Some(idx) => &self.0[idx + 1..],
            None => "",
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for AccountId {
    type Err = SyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccountId {
    type Error = SyncError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
