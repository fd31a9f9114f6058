//! First-occurrence index for delivered answers
//!
//! Records, per (lookup, chat, user), where the answer was first delivered
//! so a repeated request can point back at it instead of repeating it. The
//! table is append-only.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::{DbPool, LookupCache, LookupEntry, connection, is_unique_violation, parse_datetime};
use crate::channels::{LocationRef, ReplyAnchor};
use crate::{Error, Result};

const OCCURRENCE_COLUMNS: &str =
    "id, lookup_id, chat_id, user_id, answer_location, reply_anchor, created_at";

/// The first delivery of a lookup's answer to a user in a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstOccurrence {
    pub id: i64,
    pub lookup_id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    /// Where the answer was delivered
    pub answer_location: LocationRef,
    /// Anchor for replying to the delivered answer
    pub reply_anchor: ReplyAnchor,
    pub created_at: DateTime<Utc>,
}

/// Deduplication index repository
#[derive(Debug, Clone)]
pub struct DedupIndex {
    pool: DbPool,
    lookups: LookupCache,
}

impl DedupIndex {
    /// Create a new dedup index
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        let lookups = LookupCache::new(pool.clone());
        Self { pool, lookups }
    }

    /// Find the first occurrence for a full composite key
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_first_occurrence(
        &self,
        lookup_id: i64,
        chat_id: i64,
        user_id: i64,
    ) -> Result<Option<FirstOccurrence>> {
        let conn = connection(&self.pool)?;

        let occurrence = conn
            .query_row(
                &format!(
                    "SELECT {OCCURRENCE_COLUMNS} FROM first_occurrences
                     WHERE lookup_id = ?1 AND chat_id = ?2 AND user_id = ?3"
                ),
                params![lookup_id, chat_id, user_id],
                row_to_occurrence,
            )
            .optional()?;

        Ok(occurrence)
    }

    /// Resolve a content key and check whether this user/chat has seen it
    ///
    /// Returns `(None, None)` when the content was never looked up,
    /// `(None, Some)` when it is cached but new to this user in this chat,
    /// and `(Some, Some)` when it was already answered here. Counters are
    /// not touched.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_first_occurrence_by_content(
        &self,
        content: &str,
        chat_id: i64,
        user_id: i64,
    ) -> Result<(Option<FirstOccurrence>, Option<LookupEntry>)> {
        let Some(entry) = self.lookups.find(content)? else {
            return Ok((None, None));
        };

        let occurrence = self.find_first_occurrence(entry.id, chat_id, user_id)?;
        Ok((occurrence, Some(entry)))
    }

    /// Record where an answer was first delivered
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateOccurrence`] if the composite key was
    /// already recorded (treat as already seen). Returns error if the
    /// database operation fails otherwise.
    pub fn record_first_occurrence(
        &self,
        lookup_id: i64,
        chat_id: i64,
        user_id: i64,
        answer_location: &LocationRef,
        reply_anchor: &ReplyAnchor,
    ) -> Result<FirstOccurrence> {
        let conn = connection(&self.pool)?;

        let result = conn.query_row(
            &format!(
                "INSERT INTO first_occurrences (lookup_id, chat_id, user_id, answer_location, reply_anchor)
                 VALUES (?1, ?2, ?3, ?4, ?5) RETURNING {OCCURRENCE_COLUMNS}"
            ),
            params![
                lookup_id,
                chat_id,
                user_id,
                answer_location.as_str(),
                reply_anchor.as_str(),
            ],
            row_to_occurrence,
        );

        match result {
            Ok(occurrence) => {
                tracing::debug!(lookup_id, chat_id, user_id, "first occurrence recorded");
                Ok(occurrence)
            }
            Err(e) if is_unique_violation(&e) => Err(Error::DuplicateOccurrence {
                lookup_id,
                chat_id,
                user_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Number of distinct answers delivered in a chat
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count_for_chat(&self, chat_id: i64) -> Result<i64> {
        let conn = connection(&self.pool)?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM first_occurrences WHERE chat_id = ?1",
            [chat_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_occurrence(row: &Row<'_>) -> rusqlite::Result<FirstOccurrence> {
    Ok(FirstOccurrence {
        id: row.get(0)?,
        lookup_id: row.get(1)?,
        chat_id: row.get(2)?,
        user_id: row.get(3)?,
        answer_location: LocationRef::new(row.get::<_, String>(4)?),
        reply_anchor: ReplyAnchor::new(row.get::<_, String>(5)?),
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    const RAW: &str = r#"{"def":[{"text":"hello","pos":"noun","tr":[{"text":"привет"}]}]}"#;

    fn setup() -> (LookupCache, DedupIndex) {
        let pool = db::init_memory().unwrap();
        (LookupCache::new(pool.clone()), DedupIndex::new(pool))
    }

    #[test]
    fn record_then_find() {
        let (lookups, index) = setup();
        let entry = lookups.create("hello", RAW).unwrap();

        let location = LocationRef::new("1:10");
        let anchor = ReplyAnchor::new("10");
        let recorded = index
            .record_first_occurrence(entry.id, 1, 1, &location, &anchor)
            .unwrap();
        assert_eq!(recorded.answer_location, location);
        assert_eq!(recorded.reply_anchor, anchor);

        let found = index.find_first_occurrence(entry.id, 1, 1).unwrap().unwrap();
        assert_eq!(found, recorded);
        assert!(index.find_first_occurrence(entry.id, 1, 2).unwrap().is_none());
        assert!(index.find_first_occurrence(entry.id, 2, 1).unwrap().is_none());
    }

    #[test]
    fn duplicate_composite_key_is_rejected() {
        let (lookups, index) = setup();
        let entry = lookups.create("hello", RAW).unwrap();
        let location = LocationRef::new("1:10");
        let anchor = ReplyAnchor::new("10");

        index
            .record_first_occurrence(entry.id, 1, 1, &location, &anchor)
            .unwrap();
        let err = index
            .record_first_occurrence(entry.id, 1, 1, &LocationRef::new("1:11"), &anchor)
            .unwrap_err();

        assert!(matches!(
            err,
            Error::DuplicateOccurrence {
                chat_id: 1,
                user_id: 1,
                ..
            }
        ));
        let kept = index.find_first_occurrence(entry.id, 1, 1).unwrap().unwrap();
        assert_eq!(kept.answer_location, location);
    }

    #[test]
    fn by_content_distinguishes_three_states() {
        let (lookups, index) = setup();

        let (occurrence, entry) = index.find_first_occurrence_by_content("hello", 1, 1).unwrap();
        assert!(occurrence.is_none());
        assert!(entry.is_none());

        let created = lookups.create("hello", RAW).unwrap();
        let (occurrence, entry) = index.find_first_occurrence_by_content("hello", 1, 1).unwrap();
        assert!(occurrence.is_none());
        assert_eq!(entry.unwrap().id, created.id);

        index
            .record_first_occurrence(
                created.id,
                1,
                1,
                &LocationRef::new("1:10"),
                &ReplyAnchor::new("10"),
            )
            .unwrap();
        let (occurrence, entry) = index.find_first_occurrence_by_content("hello", 1, 1).unwrap();
        assert_eq!(occurrence.unwrap().lookup_id, created.id);
        assert_eq!(entry.unwrap().hit_count, 1);
    }

    #[test]
    fn record_requires_existing_lookup() {
        let (_, index) = setup();
        let err = index
            .record_first_occurrence(42, 1, 1, &LocationRef::new("1:1"), &ReplyAnchor::new("1"))
            .unwrap_err();
        assert!(matches!(err, Error::Sqlite(_)));
    }

    #[test]
    fn counts_per_chat() {
        let (lookups, index) = setup();
        let hello = lookups.create("hello", RAW).unwrap();
        let world = lookups.create("world", RAW).unwrap();
        let loc = LocationRef::new("1:1");
        let anchor = ReplyAnchor::new("1");

        index.record_first_occurrence(hello.id, 1, 1, &loc, &anchor).unwrap();
        index.record_first_occurrence(hello.id, 1, 2, &loc, &anchor).unwrap();
        index.record_first_occurrence(world.id, 2, 1, &loc, &anchor).unwrap();

        assert_eq!(index.count_for_chat(1).unwrap(), 2);
        assert_eq!(index.count_for_chat(2).unwrap(), 1);
        assert_eq!(index.count_for_chat(3).unwrap(), 0);
    }
}
