//! Directory provider implementations

pub mod ldap;
