//! Error types for Glossa

use thiserror::Error;

/// Result type alias for Glossa operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Glossa
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Channel (transport) error
    #[error("channel error: {0}")]
    Channel(String),

    /// Dictionary provider returned an unusable response
    #[error("dictionary provider error: {0}")]
    Provider(String),

    /// Dictionary provider did not answer in time
    #[error("dictionary provider timed out after {0:?}")]
    ProviderTimeout(std::time::Duration),

    /// A lookup for this content key was created by a concurrent writer
    #[error("lookup already exists: {0}")]
    AlreadyExists(String),

    /// A first occurrence for this (lookup, chat, user) was recorded concurrently
    #[error("first occurrence already recorded for lookup {lookup_id} in chat {chat_id} by user {user_id}")]
    DuplicateOccurrence {
        lookup_id: i64,
        chat_id: i64,
        user_id: i64,
    },

    /// Stored data violates an invariant the store itself should enforce
    #[error("consistency error: {0}")]
    Consistency(String),

    /// Callback data refers to a token that is gone or was never issued
    #[error("stale callback token: {0}")]
    StaleToken(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database pool error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
