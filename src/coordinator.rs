//! Request coordination
//!
//! Drives a single query through normalization, the dedup index, the lookup
//! cache and the dictionary provider, and decides how to reply:
//!
//! ```text
//! normalize ──empty──▶ EmptyQuery / OnlyMarkup
//!     │
//!     ▼
//! dedup index ──seen──▶ AlreadyAnswered (notice + pointer to first answer)
//!     │
//!     ▼
//! lookup cache ──miss──▶ provider ──nothing──▶ NotFound
//!     │                     │ ──error/timeout──▶ ProviderFailed
//!     ▼                     ▼
//! deliver answer ◀──── create entry
//!     │
//!     ▼
//! record first occurrence ──▶ count cache reuse ──▶ Delivered
//! ```
//!
//! Each store access is its own transaction; none is held across the
//! provider call.

use std::sync::Arc;
use std::time::Duration;

use crate::channels::{LocationRef, ReplyAnchor, Transport};
use crate::db::{DbPool, DedupIndex, LookupCache, LookupEntry};
use crate::dictionary::{DictionaryProvider, DictionaryResult, Formatter};
use crate::normalize::{Normalized, normalize};
use crate::{Error, Result, messages};

/// Default bound on a single provider call
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// How the answer to a query reaches the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Send a new message, optionally replying to another one
    Send { reply_to: Option<ReplyAnchor> },
    /// Replace the text of an existing message (the dialog prompt)
    Edit(LocationRef),
}

/// A query from a user in a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub chat_id: i64,
    pub user_id: i64,
    /// Text as typed by the user
    pub text: String,
    pub delivery: Delivery,
}

/// Terminal state of a handled query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing left after normalization
    EmptyQuery,
    /// Only backticks were sent
    OnlyMarkup,
    /// This user already got this answer in this chat
    AlreadyAnswered { original: LocationRef },
    /// The dictionary has nothing for the query
    NotFound { query: String },
    /// The dictionary could not be reached or answered with an error
    ProviderFailed,
    /// A fresh answer was delivered
    Delivered { location: LocationRef },
}

/// Result of a cache-through lookup
#[derive(Debug)]
pub enum Fetched {
    /// Served from the cache
    Cached(LookupEntry),
    /// Fetched from the provider and stored
    Stored(LookupEntry),
    /// The provider has nothing for the key
    NotFound,
    /// The provider call failed or timed out
    Failed(Error),
}

/// Look a content key up in the cache, falling back to the provider
///
/// A cache hit is counted immediately. A provider answer is stored; if a
/// concurrent writer stored the same key first, that entry is counted
/// instead.
///
/// # Errors
///
/// Returns error on persistence failures. Provider failures are reported as
/// [`Fetched::Failed`].
pub async fn fetch_or_cache(
    lookups: &LookupCache,
    provider: &dyn DictionaryProvider,
    timeout: Duration,
    key: &str,
) -> Result<Fetched> {
    if let Some(entry) = lookups.get_or_increment(key)? {
        tracing::debug!(key, hits = entry.hit_count, "lookup served from cache");
        return Ok(Fetched::Cached(entry));
    }

    match fetch_uncached(lookups, provider, timeout, key).await? {
        Fetched::Cached(_) => count_reuse(lookups, key).map(Fetched::Cached),
        other => Ok(other),
    }
}

/// Ask the provider for a key the cache doesn't hold and store the answer
///
/// Losing the insert race to another writer yields that writer's entry as
/// [`Fetched::Cached`], read without counting.
async fn fetch_uncached(
    lookups: &LookupCache,
    provider: &dyn DictionaryProvider,
    timeout: Duration,
    key: &str,
) -> Result<Fetched> {
    let raw = match tokio::time::timeout(timeout, provider.lookup(key)).await {
        Err(_) => return Ok(Fetched::Failed(Error::ProviderTimeout(timeout))),
        Ok(Err(e)) => return Ok(Fetched::Failed(e)),
        Ok(Ok(DictionaryResult::NotFound)) => return Ok(Fetched::NotFound),
        Ok(Ok(DictionaryResult::Found(raw))) => raw,
    };

    match lookups.create(key, &raw) {
        Ok(entry) => Ok(Fetched::Stored(entry)),
        Err(Error::AlreadyExists(_)) => {
            tracing::debug!(key, "lookup created concurrently, re-reading");
            lookups.find(key)?.map(Fetched::Cached).ok_or_else(|| {
                Error::Consistency(format!("lookup for {key:?} reported as existing but not found"))
            })
        }
        Err(e) => Err(e),
    }
}

/// Count one reuse of a cached entry
fn count_reuse(lookups: &LookupCache, key: &str) -> Result<LookupEntry> {
    lookups.get_or_increment(key)?.ok_or_else(|| {
        Error::Consistency(format!("lookup for {key:?} vanished before its reuse was counted"))
    })
}

/// Orchestrates lookups, deduplication and replies
pub struct RequestCoordinator {
    lookups: LookupCache,
    dedup: DedupIndex,
    provider: Arc<dyn DictionaryProvider>,
    transport: Arc<dyn Transport>,
    formatter: Arc<dyn Formatter>,
    provider_timeout: Duration,
}

impl RequestCoordinator {
    /// Create a coordinator over a database pool and its collaborators
    #[must_use]
    pub fn new(
        pool: DbPool,
        provider: Arc<dyn DictionaryProvider>,
        transport: Arc<dyn Transport>,
        formatter: Arc<dyn Formatter>,
    ) -> Self {
        Self {
            lookups: LookupCache::new(pool.clone()),
            dedup: DedupIndex::new(pool),
            provider,
            transport,
            formatter,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Override the provider call timeout
    #[must_use]
    pub const fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Handle one query end to end
    ///
    /// # Errors
    ///
    /// Returns error if the store or the transport fails, or if a cached
    /// payload cannot be rendered. Provider failures are not errors; they
    /// end in [`Outcome::ProviderFailed`].
    pub async fn handle(&self, query: &Query) -> Result<Outcome> {
        let key = match normalize(&query.text) {
            Normalized::Query(key) => key,
            Normalized::Empty => {
                self.reply(query, messages::EMPTY_REQUEST).await?;
                return Ok(Outcome::EmptyQuery);
            }
            Normalized::OnlyMarkup => {
                self.reply(query, messages::ONLY_TILDE).await?;
                return Ok(Outcome::OnlyMarkup);
            }
        };

        let (occurrence, cached) =
            self.dedup
                .find_first_occurrence_by_content(&key, query.chat_id, query.user_id)?;

        if let Some(first) = occurrence {
            tracing::info!(
                chat_id = query.chat_id,
                user_id = query.user_id,
                key = %key,
                "query already answered in this chat"
            );
            self.reply(query, messages::ALREADY_REQUESTED).await?;
            if let Err(e) = self
                .transport
                .deliver(query.chat_id, messages::POINTER, Some(&first.reply_anchor))
                .await
            {
                tracing::warn!(error = %e, anchor = %first.reply_anchor, "failed to point at first answer");
            }
            return Ok(Outcome::AlreadyAnswered {
                original: first.answer_location,
            });
        }

        let fetched = match cached {
            Some(entry) => Fetched::Cached(entry),
            None => {
                fetch_uncached(
                    &self.lookups,
                    self.provider.as_ref(),
                    self.provider_timeout,
                    &key,
                )
                .await?
            }
        };

        let (entry, reused) = match fetched {
            Fetched::Cached(entry) => (entry, true),
            Fetched::Stored(entry) => (entry, false),
            Fetched::NotFound => {
                self.reply(query, &messages::cant_find(&key)).await?;
                return Ok(Outcome::NotFound { query: key });
            }
            Fetched::Failed(e) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    error = %e,
                    key = %key,
                    "dictionary lookup failed"
                );
                self.reply(query, messages::SOMETHING_WRONG).await?;
                return Ok(Outcome::ProviderFailed);
            }
        };

        let text = self.formatter.render(&entry.raw)?;
        let location = self.reply(query, &text).await?;
        let anchor = self.transport.reply_anchor(&location);

        match self.dedup.record_first_occurrence(
            entry.id,
            query.chat_id,
            query.user_id,
            &location,
            &anchor,
        ) {
            Ok(_) => {}
            Err(Error::DuplicateOccurrence { .. }) => {
                tracing::debug!(
                    chat_id = query.chat_id,
                    user_id = query.user_id,
                    key = %key,
                    "first occurrence recorded concurrently"
                );
            }
            Err(e) => return Err(e),
        }

        // a reuse only counts once the answer is out
        let hits = if reused {
            count_reuse(&self.lookups, &key)?.hit_count
        } else {
            entry.hit_count
        };

        tracing::info!(
            chat_id = query.chat_id,
            user_id = query.user_id,
            key = %key,
            hits,
            transport = self.transport.name(),
            "answer delivered"
        );
        Ok(Outcome::Delivered { location })
    }

    /// Send or edit according to the query's delivery mode
    async fn reply(&self, query: &Query, text: &str) -> Result<LocationRef> {
        match &query.delivery {
            Delivery::Send { reply_to } => {
                self.transport
                    .deliver(query.chat_id, text, reply_to.as_ref())
                    .await
            }
            Delivery::Edit(location) => {
                self.transport.edit_delivered(location, text).await?;
                Ok(location.clone())
            }
        }
    }
}
