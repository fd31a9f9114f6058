//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Memoized dictionary responses, one row per content key
        CREATE TABLE IF NOT EXISTS lookups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content TEXT NOT NULL,
            raw TEXT NOT NULL,
            hit_count INTEGER NOT NULL DEFAULT 1 CHECK(hit_count >= 1),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_lookups_content ON lookups(content);

        -- Single-use payloads referenced from inline keyboard callback data
        CREATE TABLE IF NOT EXISTS callback_tokens (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- First delivery of a lookup's answer to a user within a chat
        CREATE TABLE IF NOT EXISTS first_occurrences (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lookup_id INTEGER NOT NULL REFERENCES lookups(id),
            chat_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            answer_location TEXT NOT NULL,
            reply_anchor TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_first_occurrences_key
            ON first_occurrences(lookup_id, chat_id, user_id);
        CREATE INDEX IF NOT EXISTS idx_first_occurrences_chat ON first_occurrences(chat_id);

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::info!("migrated to schema v2");
    Ok(())
}
