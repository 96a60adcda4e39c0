//! ldapsync core - domain types and collaborator traits for directory to
//! account-system reconciliation

pub mod error;
pub mod ids;
pub mod models;
pub mod outcome;
pub mod traits;


pub use error::*;
pub use ids::*;
pub use models::*;
pub use outcome::*;
pub use traits::*;
