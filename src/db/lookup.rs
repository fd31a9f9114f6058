//! Content-addressed cache of dictionary responses
//!
//! Each normalized query (content key) maps to exactly one stored provider
//! response. Uniqueness is enforced by the `idx_lookups_content` index, so
//! concurrent writers racing on the same key see [`Error::AlreadyExists`]
//! instead of creating a second row.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use super::{DbPool, connection, is_unique_violation, parse_datetime};
use crate::{Error, Result};

const ENTRY_COLUMNS: &str = "id, content, raw, hit_count, created_at, updated_at";

/// A memoized provider response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupEntry {
    pub id: i64,
    /// Normalized query this response answers
    pub content: String,
    /// Opaque provider payload (serialized JSON)
    pub raw: String,
    /// Number of times the payload was served, including the creating call
    pub hit_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lookup cache repository
#[derive(Debug, Clone)]
pub struct LookupCache {
    pool: DbPool,
}

impl LookupCache {
    /// Create a new lookup cache
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find the entry for a content key without touching its counter
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails, or
    /// [`Error::Consistency`] if the key maps to more than one row
    pub fn find(&self, content: &str) -> Result<Option<LookupEntry>> {
        let conn = connection(&self.pool)?;
        let rows = select_by_content(&conn, content)?;
        single(content, rows)
    }

    /// Fetch the entry for a content key and count this use
    ///
    /// Runs in one immediate transaction so the read and the increment
    /// cannot interleave with another writer.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails, or
    /// [`Error::Consistency`] if the key maps to more than one row
    pub fn get_or_increment(&self, content: &str) -> Result<Option<LookupEntry>> {
        let mut conn = connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let rows = select_by_content(&tx, content)?;
        let Some(entry) = single(content, rows)? else {
            return Ok(None);
        };

        let updated = tx
            .query_row(
                &format!(
                    "UPDATE lookups SET hit_count = hit_count + 1, updated_at = datetime('now')
                     WHERE id = ?1 RETURNING {ENTRY_COLUMNS}"
                ),
                [entry.id],
                row_to_entry,
            )
            .optional()?;
        tx.commit()?;

        updated.map_or_else(
            || {
                Err(Error::Consistency(format!(
                    "lookup {} for {content:?} vanished during increment",
                    entry.id
                )))
            },
            |entry| Ok(Some(entry)),
        )
    }

    /// Store a provider response for a content key
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if another writer stored the key
    /// first; callers should re-read with [`Self::get_or_increment`].
    /// Returns error if the database operation fails otherwise.
    pub fn create(&self, content: &str, raw: &str) -> Result<LookupEntry> {
        let conn = connection(&self.pool)?;

        let result = conn.query_row(
            &format!("INSERT INTO lookups (content, raw) VALUES (?1, ?2) RETURNING {ENTRY_COLUMNS}"),
            params![content, raw],
            row_to_entry,
        );

        match result {
            Ok(entry) => {
                tracing::debug!(id = entry.id, content, "lookup cached");
                Ok(entry)
            }
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists(content.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Most requested entries, highest hit count first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn top(&self, limit: usize) -> Result<Vec<LookupEntry>> {
        let conn = connection(&self.pool)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM lookups ORDER BY hit_count DESC, content ASC LIMIT ?1"
        ))?;
        let entries = stmt
            .query_map([limit], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// Number of distinct content keys stored
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count(&self) -> Result<i64> {
        let conn = connection(&self.pool)?;
        let count = conn.query_row("SELECT COUNT(*) FROM lookups", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn select_by_content(conn: &Connection, content: &str) -> rusqlite::Result<Vec<LookupEntry>> {
    // Two rows are enough to detect a broken uniqueness invariant
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM lookups WHERE content = ?1 LIMIT 2"
    ))?;
    stmt.query_map([content], row_to_entry)?.collect()
}

fn single(content: &str, mut rows: Vec<LookupEntry>) -> Result<Option<LookupEntry>> {
    if rows.len() > 1 {
        tracing::error!(content, "multiple lookups stored for one content key");
        return Err(Error::Consistency(format!(
            "multiple lookups stored for {content:?}"
        )));
    }
    Ok(rows.pop())
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<LookupEntry> {
    Ok(LookupEntry {
        id: row.get(0)?,
        content: row.get(1)?,
        raw: row.get(2)?,
        hit_count: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}
