//! Shared-secret registration MAC
//!
//! The admin registration endpoint authenticates requests with an
//! HMAC-SHA1 over `nonce \0 username \0 password \0 admin|notadmin`,
//! keyed by the homeserver's registration shared secret, hex encoded.

use hmac::{Hmac, Mac};
use sha1::Sha1;

use ldapsync_core::{Result, SyncError};

type HmacSha1 = Hmac<Sha1>;

/// Compute the registration MAC for one nonce.
pub fn registration_mac(
    shared_secret: &str,
    nonce: &str,
    username: &str,
    password: &str,
    admin: bool,
) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(shared_secret.as_bytes())
        .map_err(|e| SyncError::internal(format!("Invalid registration secret: {}", e)))?;

    mac.update(nonce.as_bytes());
    mac.update(b"\x00");
    mac.update(username.as_bytes());
    mac.update(b"\x00");
    mac.update(password.as_bytes());
    mac.update(b"\x00");
    mac.update(if admin { b"admin" as &[u8] } else { b"notadmin" });

    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_is_deterministic_hex_sha1() {
        let a = registration_mac("secret", "nonce-1", "alice", "", false).unwrap();
        let b = registration_mac("secret", "nonce-1", "alice", "", false).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_mac_binds_every_field() {
        let base = registration_mac("secret", "nonce-1", "alice", "pw", false).unwrap();
        assert_ne!(base, registration_mac("other", "nonce-1", "alice", "pw", false).unwrap());
        assert_ne!(base, registration_mac("secret", "nonce-2", "alice", "pw", false).unwrap());
        assert_ne!(base, registration_mac("secret", "nonce-1", "bob", "pw", false).unwrap());
        assert_ne!(base, registration_mac("secret", "nonce-1", "alice", "pw2", false).unwrap());
        assert_ne!(base, registration_mac("secret", "nonce-1", "alice", "pw", true).unwrap());
    }

    #[test]
    fn test_field_separators_prevent_ambiguity() {
        let a = registration_mac("secret", "n", "ab", "c", false).unwrap();
        let b = registration_mac("secret", "n", "a", "bc", false).unwrap();
        assert_ne!(a, b);
    }
}
