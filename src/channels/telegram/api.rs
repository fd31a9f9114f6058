//! Raw Telegram Bot API calls

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::retry::{self, is_recoverable};
use super::types::{
    AnswerCallbackQueryRequest, BotCommand, EditMessageTextRequest, Empty, GetUpdatesRequest,
    InlineKeyboardMarkup, SendMessageRequest, SentMessage, SetMyCommandsRequest,
    TelegramResponse, Update, User,
};
use crate::{Error, Result};

/// Bound on a regular API call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time granted to a long poll beyond its server-side timeout
const LONG_POLL_GRACE: Duration = Duration::from_secs(15);

static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex must compile"));

impl super::TelegramChannel {
    /// POST a JSON request to a Bot API method and unwrap its `result`
    ///
    /// Rate limits and server errors are retried per the channel's
    /// [`RetryPolicy`](super::RetryPolicy), honoring `retry_after`. Transport
    /// errors are not retried since the request may already have been applied.
    async fn call<Req, Resp>(&self, method: &str, request: &Req, timeout: Duration) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.method_url(method);
        let mut attempt = 0;

        loop {
            let response = self
                .client
                .post(&url)
                .json(request)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| Error::Channel(format!("Telegram {method} error: {e}")))?;

            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            if response_ok(status) {
                let parsed: TelegramResponse<Resp> = serde_json::from_str(&body)?;
                return match (parsed.ok, parsed.result) {
                    (true, Some(result)) => Ok(result),
                    (_, _) => Err(Error::Channel(format!(
                        "Telegram {method} error: {}",
                        parsed.description.as_deref().unwrap_or("empty result")
                    ))),
                };
            }

            if is_recoverable(status) && self.retry.allows_retry(attempt) {
                let delay = self.retry.delay(attempt, retry::parse_retry_after(&body));
                tracing::warn!(method, status, attempt, delay_ms = delay.as_millis(), "Telegram API call failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return Err(Error::Channel(format!(
                "Telegram {method} error: {status} - {}",
                describe(&body)
            )));
        }
    }

    /// Send a message to a chat and return its message id
    ///
    /// Uses HTML parse mode with plain-text fallback when Telegram rejects
    /// the markup.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<i64> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: Some("HTML"),
            reply_to_message_id: reply_to,
            allow_sending_without_reply: reply_to.map(|_| true),
            disable_web_page_preview: Some(true),
            reply_markup,
        };

        let sent: SentMessage = match self.call("sendMessage", &request, REQUEST_TIMEOUT).await {
            Ok(sent) => sent,
            Err(e) if is_parse_error(&e) => {
                tracing::debug!(chat_id, error = %e, "HTML rejected, resending as plain text");
                let plain = strip_html(text);
                let request = SendMessageRequest {
                    text: &plain,
                    parse_mode: None,
                    ..request
                };
                self.call("sendMessage", &request, REQUEST_TIMEOUT).await?
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(chat_id, message_id = sent.message_id, "Telegram message sent");
        Ok(sent.message_id)
    }

    /// Replace the text of a sent message, dropping its inline keyboard
    ///
    /// An edit that leaves the text unchanged is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn edit_message_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()> {
        let request = EditMessageTextRequest {
            chat_id,
            message_id,
            text,
            parse_mode: Some("HTML"),
        };

        // Result is the edited Message, or `true` for inline messages
        let mut result = self
            .call::<_, serde_json::Value>("editMessageText", &request, REQUEST_TIMEOUT)
            .await;
        if matches!(&result, Err(e) if is_parse_error(e)) {
            let plain = strip_html(text);
            let request = EditMessageTextRequest {
                text: &plain,
                parse_mode: None,
                ..request
            };
            result = self
                .call::<_, serde_json::Value>("editMessageText", &request, REQUEST_TIMEOUT)
                .await;
        }

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_not_modified(&e) => {
                tracing::debug!(chat_id, message_id, "message already has this text");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Acknowledge a callback query so the client stops its spinner
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn answer_callback_query(&self, callback_query_id: &str, text: Option<&str>) -> Result<()> {
        let request = AnswerCallbackQueryRequest {
            callback_query_id,
            text,
        };
        self.call::<_, bool>("answerCallbackQuery", &request, REQUEST_TIMEOUT)
            .await
            .map(|_| ())
    }

    /// Fetch the bot's own user
    ///
    /// # Errors
    ///
    /// Returns error if the token is invalid or the API request fails
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &Empty {}, REQUEST_TIMEOUT).await
    }

    /// Remove any configured webhook so `getUpdates` can be used
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn delete_webhook(&self) -> Result<()> {
        self.call::<_, bool>("deleteWebhook", &Empty {}, REQUEST_TIMEOUT)
            .await
            .map(|_| ())
    }

    /// Register the bot's commands in Telegram's command menu
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn sync_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let request = SetMyCommandsRequest { commands };
        self.call::<_, bool>("setMyCommands", &request, REQUEST_TIMEOUT)
            .await?;
        tracing::info!(count = commands.len(), "Telegram bot commands registered");
        Ok(())
    }

    /// Long-poll for updates after `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub(crate) async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message", "callback_query"],
        };
        let timeout = Duration::from_secs(timeout_secs) + LONG_POLL_GRACE;
        self.call("getUpdates", &request, timeout).await
    }
}

const fn response_ok(status: u16) -> bool {
    status >= 200 && status < 300
}

/// Pull `description` out of an error body, falling back to the raw body
fn describe(body: &str) -> String {
    serde_json::from_str::<TelegramResponse<serde_json::Value>>(body)
        .ok()
        .and_then(|r| r.description)
        .unwrap_or_else(|| body.to_string())
}

fn is_parse_error(error: &Error) -> bool {
    matches!(error, Error::Channel(msg) if msg.to_lowercase().contains("can't parse entities"))
}

/// Plain-text rendition of an HTML message: tags dropped, entities decoded
fn strip_html(text: &str) -> String {
    HTML_TAG_RE
        .replace_all(text, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn is_not_modified(error: &Error) -> bool {
    matches!(error, Error::Channel(msg) if msg.contains("message is not modified"))
}
