//! Single-use payload store for inline keyboard callbacks
//!
//! Telegram limits `callback_data` to 64 bytes, so a button carries a
//! [`TokenId`] and the text it refers to lives here. Taking a token deletes
//! it: a replayed or stale button resolves to nothing.

use std::fmt;
use std::str::FromStr;

use rusqlite::OptionalExtension;

use super::{DbPool, connection};
use crate::{Error, Result};

/// Compact handle for a stored payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId(i64);

impl TokenId {
    /// Raw row id
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TokenId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<i64>()
            .map(Self)
            .map_err(|_| Error::StaleToken(s.to_string()))
    }
}

/// Token store repository
#[derive(Debug, Clone)]
pub struct TokenStore {
    pool: DbPool,
}

impl TokenStore {
    /// Create a new token store
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Store a payload and return its token
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn store(&self, payload: &str) -> Result<TokenId> {
        let conn = connection(&self.pool)?;
        conn.execute("INSERT INTO callback_tokens (payload) VALUES (?1)", [payload])?;
        Ok(TokenId(conn.last_insert_rowid()))
    }

    /// Retrieve a payload and delete it in the same statement
    ///
    /// A second call with the same token returns `None`.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn take_once(&self, token: TokenId) -> Result<Option<String>> {
        let conn = connection(&self.pool)?;

        let payload = conn
            .query_row(
                "DELETE FROM callback_tokens WHERE id = ?1 RETURNING payload",
                [token.0],
                |row| row.get(0),
            )
            .optional()?;

        if payload.is_none() {
            tracing::debug!(token = token.0, "callback token missing or already used");
        }

        Ok(payload)
    }
}
