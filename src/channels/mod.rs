//! Chat transport abstraction
//!
//! The request coordinator only needs to deliver text, edit text it already
//! delivered, and reply to an earlier message. Whatever the transport hands
//! back to identify a message is stored and forwarded, never interpreted.

pub mod telegram;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use telegram::TelegramChannel;

/// Opaque pointer to a delivered message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationRef(String);

impl LocationRef {
    /// Wrap a transport-specific identifier
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque pointer used to reply to ("jump to") an earlier message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplyAnchor(String);

impl ReplyAnchor {
    /// Wrap a transport-specific identifier
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplyAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outbound side of a chat transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logging
    fn name(&self) -> &'static str;

    /// Deliver a new message, optionally as a reply, and return where it landed
    async fn deliver(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<&ReplyAnchor>,
    ) -> Result<LocationRef>;

    /// Replace the text of a message this transport delivered earlier
    async fn edit_delivered(&self, location: &LocationRef, text: &str) -> Result<()>;

    /// Anchor that replies to the message at `location`
    fn reply_anchor(&self, location: &LocationRef) -> ReplyAnchor;
}
