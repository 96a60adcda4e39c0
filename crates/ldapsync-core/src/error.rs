//! Error types for ldapsync

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Directory error: {message}")]
    Directory { message: String },

    #[error("Remote error: {message}")]
    Remote { message: String },

    #[error("Authentication error: {message}")]
    Auth { message: String },

    #[error("Unable to register the service account after {attempts} attempts")]
    BootstrapExhausted { attempts: u32 },

    #[error("Tombstone store error: {message}")]
    Tombstone { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SyncError {
    pub fn directory(message: impl Into<String>) -> Self {
        Self::Directory {
            message: message.into(),
        }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn tombstone(message: impl Into<String>) -> Self {
        Self::Tombstone {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
