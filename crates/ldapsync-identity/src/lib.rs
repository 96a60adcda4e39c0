//! ldapsync identity - directory providers
//!
//! A provider implements [`ldapsync_core::DirectorySource`] and turns the
//! directory's entries into the normalized user snapshot the reconciliation
//! engine consumes. Only LDAP / Active Directory is provided; the network
//! half is gated behind the `ldap` feature (on by default).

pub mod providers;

#[cfg(test)]
mod tests;

pub use providers::ldap::{directory_user_from_attrs, LdapConfig, LdapDirectory};
