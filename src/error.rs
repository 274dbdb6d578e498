//! Error types for storediff operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorediffError>;

#[derive(Error, Debug)]
pub enum StorediffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Acquisition error: {0}")]
    Acquisition(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Failed to open store set: {message}")]
    StoreOpen { message: String },

    #[error("Version {version} not present in snapshot")]
    VersionNotFound { version: i64 },

    #[error("Store '{name}' does not expose an ordered iteration capability")]
    UnsupportedStore { name: String },

    #[error("Stream error in store '{store}': {message}")]
    Stream { store: String, message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Comparison cancelled")]
    Cancelled,

    #[error("Walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl StorediffError {
    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition(msg.into())
    }

    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    pub fn store_open(msg: impl Into<String>) -> Self {
        Self::StoreOpen {
            message: msg.into(),
        }
    }

    pub fn unsupported_store(name: impl Into<String>) -> Self {
        Self::UnsupportedStore { name: name.into() }
    }

    pub fn stream(store: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Stream {
            store: store.into(),
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }
}
