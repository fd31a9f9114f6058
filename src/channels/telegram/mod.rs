//! Telegram channel adapter
//!
//! Long polling for receiving updates and the Bot API for sending.
//! Messages are located as `"<chat_id>:<message_id>"`; reply anchors are the
//! bare message id, which is only meaningful inside the same chat.

mod api;
pub mod polling;
pub mod retry;
pub mod types;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;

use super::{LocationRef, ReplyAnchor, Transport};
use crate::{Error, Result};

pub use retry::RetryPolicy;
pub use types::{BotCommand, CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update};

/// Telegram channel adapter
#[derive(Clone)]
pub struct TelegramChannel {
    token: String,
    client: Client,
    api_base: String,
    retry: RetryPolicy,
    update_tx: Option<mpsc::Sender<Update>>,
}

impl TelegramChannel {
    /// Create a new Telegram channel adapter
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            token,
            client: Client::new(),
            api_base: types::API_BASE.to_string(),
            retry: RetryPolicy::default(),
            update_tx: None,
        }
    }

    /// Create with an update receiver for polling mode
    ///
    /// Returns the channel and a receiver for incoming updates
    #[must_use]
    pub fn with_receiver(token: String) -> (Self, mpsc::Receiver<Update>) {
        let (tx, rx) = mpsc::channel(100);
        let mut channel = Self::new(token);
        channel.update_tx = Some(tx);
        (channel, rx)
    }

    /// Point at a different Bot API server (e.g. a self-hosted one)
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Override the retry policy for API calls
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}{}/{method}", self.api_base, self.token)
    }
}

/// Location of a Telegram message
#[must_use]
pub fn location(chat_id: i64, message_id: i64) -> LocationRef {
    LocationRef::new(format!("{chat_id}:{message_id}"))
}

/// Split a location into chat id and message id
///
/// # Errors
///
/// Returns error if the location was not produced by [`location`]
pub fn parse_location(location: &LocationRef) -> Result<(i64, i64)> {
    location
        .as_str()
        .split_once(':')
        .and_then(|(chat, message)| Some((chat.parse().ok()?, message.parse().ok()?)))
        .ok_or_else(|| Error::Channel(format!("not a Telegram message location: {location}")))
}

fn parse_anchor(anchor: &ReplyAnchor) -> Result<i64> {
    anchor
        .as_str()
        .parse()
        .map_err(|_| Error::Channel(format!("not a Telegram message id: {anchor}")))
}

#[async_trait]
impl Transport for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn deliver(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<&ReplyAnchor>,
    ) -> Result<LocationRef> {
        let reply_to = reply_to.map(parse_anchor).transpose()?;
        let message_id = self.send_message(chat_id, text, reply_to, None).await?;
        Ok(location(chat_id, message_id))
    }

    async fn edit_delivered(&self, location: &LocationRef, text: &str) -> Result<()> {
        let (chat_id, message_id) = parse_location(location)?;
        self.edit_message_text(chat_id, message_id, text).await
    }

    fn reply_anchor(&self, location: &LocationRef) -> ReplyAnchor {
        let message_id = location
            .as_str()
            .split_once(':')
            .map_or(location.as_str(), |(_, message)| message);
        ReplyAnchor::new(message_id)
    }
}
