//! ldapsync synapse - remote account client for a Synapse homeserver
//!
//! Implements [`ldapsync_core::AccountApi`] over the Synapse admin API:
//! shared-secret registration, password login, paginated account listing,
//! partial attribute updates, erasure and reactivation.

pub mod client;
pub mod dto;
pub mod mac;

pub use client::{classify_error, SynapseClient, SynapseConfig, PAGE_SIZE};
pub use mac::registration_mac;
