//! Wire types for the Synapse admin and client-server APIs

use serde::{Deserialize, Deserializer, Serialize};

use ldapsync_core::{AccountId, RemoteAccount};

// =============================================================================
// Errors
// =============================================================================

/// Standard Matrix error body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub errcode: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub const ERRCODE_USER_IN_USE: &str = "M_USER_IN_USE";
pub const ERRCODE_UNKNOWN_TOKEN: &str = "M_UNKNOWN_TOKEN";
pub const ERROR_TOKEN_EXPIRED: &str = "Access token has expired";

// =============================================================================
// Registration
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterBody<'a> {
    pub nonce: &'a str,
    pub username: &'a str,
    pub displayname: &'a str,
    pub password: &'a str,
    pub admin: bool,
    pub mac: &'a str,
}

// =============================================================================
// Login
// =============================================================================

#[derive(Debug, Serialize)]
pub struct LoginIdentifier<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub user: &'a str,
}

#[derive(Debug, Serialize)]
pub struct LoginBody<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub identifier: LoginIdentifier<'a>,
    pub password: &'a str,
    pub initial_device_display_name: &'a str,
}

impl<'a> LoginBody<'a> {
    pub fn password(user: &'a str, password: &'a str, device: &'a str) -> Self {
        Self {
            kind: "m.login.password",
            identifier: LoginIdentifier {
                kind: "m.id.user",
                user,
            },
            password,
            initial_device_display_name: device,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

// =============================================================================
// Account listing
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct UsersPage {
    #[serde(default)]
    pub users: Vec<UserEntry>,
    /// A string on current servers, an integer on some older ones.
    #[serde(default)]
    pub next_token: Option<serde_json::Value>,
}

impl UsersPage {
    pub fn next_cursor(&self) -> Option<String> {
        match self.next_token.as_ref()? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserEntry {
    pub name: String,
    #[serde(default)]
    pub displayname: Option<String>,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub admin: bool,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub deactivated: bool,
}

impl UserEntry {
    /// `None` when the server returned a name that is not a valid account id.
    pub fn into_account(self) -> Option<RemoteAccount> {
        let id = AccountId::parse(&self.name).ok()?;
        Some(RemoteAccount {
            id,
            display_name: self.displayname.unwrap_or_default(),
            admin: self.admin,
            deactivated: self.deactivated,
        })
    }
}

/// Accepts `true`/`false`, `0`/`1` and `null`.
fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(i)) => i != 0,
        None => false,
    })
}

// =============================================================================
// Deactivation
// =============================================================================

#[derive(Debug, Serialize)]
pub struct DeactivateBody {
    pub erase: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_entry_accepts_integer_flags() {
        let entry: UserEntry = serde_json::from_value(serde_json::json!({
            "name": "@old:example.org",
            "displayname": null,
            "admin": 1,
            "deactivated": 0
        }))
        .unwrap();

        let account = entry.into_account().unwrap();
        assert!(account.admin);
        assert!(!account.deactivated);
        assert_eq!(account.display_name, "");
    }

    #[test]
    fn test_user_entry_with_invalid_name_is_dropped() {
        let entry: UserEntry =
            serde_json::from_value(serde_json::json!({ "name": "not-an-id" })).unwrap();
        assert!(entry.into_account().is_none());
    }

    #[test]
    fn test_next_cursor_forms() {
        let page: UsersPage =
            serde_json::from_value(serde_json::json!({ "users": [], "next_token": "100" }))
                .unwrap();
        assert_eq!(page.next_cursor().as_deref(), Some("100"));

        let page: UsersPage =
            serde_json::from_value(serde_json::json!({ "users": [], "next_token": 200 })).unwrap();
        assert_eq!(page.next_cursor().as_deref(), Some("200"));

        let page: UsersPage = serde_json::from_value(serde_json::json!({ "users": [] })).unwrap();
        assert!(page.next_cursor().is_none());
    }

    #[test]
    fn test_login_body_shape() {
        let body = LoginBody::password("ldapsync", "pw", "ldapsync");
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "type": "m.login.password",
                "identifier": { "type": "m.id.user", "user": "ldapsync" },
                "password": "pw",
                "initial_device_display_name": "ldapsync"
            })
        );
    }
}
