//! ldapsync sync - credential lifecycle, tombstones, reconciliation and
//! scheduling

pub mod credentials;
pub mod engine;
pub mod report;
pub mod scheduler;
pub mod service;
pub mod snapshot;
pub mod tombstone;


pub use credentials::*;
pub use engine::*;
pub use report::*;
pub use scheduler::*;
pub use service::*;
pub use snapshot::*;
pub use tombstone::*;
