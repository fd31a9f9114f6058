//! Glossa - dictionary lookup bot for Telegram
//!
//! Users ask for a word with `/tr <word>` or by pressing a button under any
//! message; the bot answers with the dictionary article. Answers are cached
//! per content, and a user asking again in the same chat is pointed at the
//! earlier answer instead of getting a duplicate.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │        Telegram (long polling, Bot API)       │
//! └──────────────────────┬───────────────────────┘
//!                        │ one task per update
//! ┌──────────────────────▼───────────────────────┐
//! │  bot: commands, dialog prompt, callbacks      │
//! │       (TokenStore holds button payloads)      │
//! └──────────────────────┬───────────────────────┘
//!                        │
//! ┌──────────────────────▼───────────────────────┐
//! │  RequestCoordinator                           │
//! │   normalize → DedupIndex → LookupCache        │
//! │            → DictionaryProvider → Transport   │
//! └──────────────────────┬───────────────────────┘
//!                        │
//! ┌──────────────────────▼───────────────────────┐
//! │            SQLite (r2d2 pool)                 │
//! └──────────────────────────────────────────────┘
//! ```

pub mod bot;
pub mod channels;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod dictionary;
pub mod error;
pub mod messages;
pub mod normalize;

pub use bot::Bot;
pub use channels::{LocationRef, ReplyAnchor, TelegramChannel, Transport};
pub use config::Config;
pub use coordinator::{Delivery, Fetched, Outcome, Query, RequestCoordinator, fetch_or_cache};
pub use db::{DbConn, DbPool, DedupIndex, LookupCache, TokenStore};
pub use dictionary::{DictionaryFormatter, DictionaryProvider, DictionaryResult, Formatter, YandexDictionary};
pub use error::{Error, Result};
