//! Telegram update dispatcher
//!
//! Each update is handled on its own task. Commands:
//!
//! - `/tr <text>` looks the text up and replies with the answer
//! - `/stats` lists the most requested words
//! - `/start`, `/help` greet
//!
//! Any other text gets a "translate it?" prompt whose buttons refer to the
//! text through the token store. Pressing a button replaces the prompt with
//! the answer (or with a dismissal).

pub mod callback;

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::sync::mpsc;

use crate::channels::telegram::{BotCommand, CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update};
use crate::channels::{ReplyAnchor, TelegramChannel, Transport};
use crate::coordinator::{Delivery, Query, RequestCoordinator};
use crate::db::{DbPool, DedupIndex, LookupCache, LookupEntry, TokenStore};
use crate::{Result, messages};

pub use callback::{ButtonOption, CallbackAction};

/// Number of entries shown by `/stats`
pub const STATS_LIMIT: usize = 10;

static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^/(\w+)(?:@(\w+))?(?:\s+(.*))?$").expect("command regex must compile")
});

/// A parsed chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/tr <text>`
    Translate(String),
    /// `/stats`
    Stats,
    /// `/start` or `/help`
    Start,
    /// Any other command
    Unknown(String),
}

/// Parse a command message
///
/// Returns `None` for plain text and for commands addressed to another bot
/// (`/cmd@other_bot`).
#[must_use]
pub fn parse_command(text: &str, bot_username: Option<&str>) -> Option<Command> {
    let caps = COMMAND_RE.captures(text.trim_start())?;

    if let (Some(target), Some(me)) = (caps.get(2), bot_username)
        && !target.as_str().eq_ignore_ascii_case(me)
    {
        return None;
    }

    let name = caps.get(1).map_or("", |m| m.as_str()).to_lowercase();
    let args = caps.get(3).map_or("", |m| m.as_str()).trim().to_string();

    Some(match name.as_str() {
        "tr" => Command::Translate(args),
        "stats" => Command::Stats,
        "start" | "help" => Command::Start,
        _ => Command::Unknown(name),
    })
}

/// Render the `/stats` listing
///
/// `chat_answers` is the number of first answers recorded in the asking
/// chat.
#[must_use]
pub fn stats_text(entries: &[LookupEntry], chat_answers: i64) -> String {
    if entries.is_empty() {
        return messages::NO_STATS.to_string();
    }
    let mut lines: Vec<_> = entries
        .iter()
        .map(|e| messages::stats_line(&e.content, e.hit_count))
        .collect();
    lines.push(String::new());
    lines.push(messages::chat_total(chat_answers));
    lines.join("\n")
}

/// Commands advertised in Telegram's command menu
#[must_use]
pub fn bot_commands() -> Vec<BotCommand> {
    [
        ("tr", "Translate a word or phrase"),
        ("stats", "Most requested words"),
        ("start", "How to use this bot"),
    ]
    .into_iter()
    .map(|(command, description)| BotCommand {
        command: command.to_string(),
        description: description.to_string(),
    })
    .collect()
}

/// The chat bot
pub struct Bot {
    channel: TelegramChannel,
    coordinator: RequestCoordinator,
    tokens: TokenStore,
    lookups: LookupCache,
    dedup: DedupIndex,
    username: Option<String>,
}

impl Bot {
    /// Create a bot around a channel and a coordinator sharing `pool`
    #[must_use]
    pub fn new(channel: TelegramChannel, coordinator: RequestCoordinator, pool: DbPool) -> Self {
        Self {
            channel,
            coordinator,
            tokens: TokenStore::new(pool.clone()),
            lookups: LookupCache::new(pool.clone()),
            dedup: DedupIndex::new(pool),
            username: None,
        }
    }

    /// Identify the bot and register its commands
    ///
    /// # Errors
    ///
    /// Returns error if the bot token is rejected
    pub async fn prepare(&mut self) -> Result<()> {
        let me = self.channel.get_me().await?;
        tracing::info!(bot_id = me.id, username = ?me.username, "connected to Telegram");
        self.username = me.username;

        if let Err(e) = self.channel.sync_commands(&bot_commands()).await {
            tracing::warn!(error = %e, "failed to register bot commands");
        }
        Ok(())
    }

    /// Dispatch updates until the receiver closes
    pub async fn run(self: Arc<Self>, mut updates: mpsc::Receiver<Update>) {
        while let Some(update) = updates.recv().await {
            let bot = Arc::clone(&self);
            tokio::spawn(async move {
                bot.handle_update(update).await;
            });
        }
        tracing::info!("update stream closed");
    }

    /// Handle one update
    pub async fn handle_update(&self, update: Update) {
        let update_id = update.update_id;
        let result = if let Some(message) = update.message {
            self.handle_message(&message).await
        } else if let Some(query) = update.callback_query {
            self.handle_callback(&query).await
        } else {
            Ok(())
        };

        if let Err(e) = result {
            tracing::error!(update_id, error = %e, "failed to handle update");
        }
    }

    async fn handle_message(&self, message: &Message) -> Result<()> {
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        let Some(from) = &message.from else {
            return Ok(());
        };
        if from.is_bot {
            return Ok(());
        }

        let chat_id = message.chat.id;
        let origin = ReplyAnchor::new(message.message_id.to_string());

        match parse_command(text, self.username.as_deref()) {
            Some(Command::Translate(args)) => {
                let query = Query {
                    chat_id,
                    user_id: from.id,
                    text: args,
                    delivery: Delivery::Send {
                        reply_to: Some(origin),
                    },
                };
                self.answer(&query).await
            }
            Some(Command::Stats) => {
                let top = self.lookups.top(STATS_LIMIT)?;
                let answered = self.dedup.count_for_chat(chat_id)?;
                self.channel
                    .deliver(chat_id, &stats_text(&top, answered), Some(&origin))
                    .await
                    .map(|_| ())
            }
            Some(Command::Start) => self
                .channel
                .deliver(chat_id, messages::WELCOME, None)
                .await
                .map(|_| ()),
            Some(Command::Unknown(name)) => {
                tracing::debug!(chat_id, command = %name, "ignoring unknown command");
                Ok(())
            }
            None => self.prompt(chat_id, message.message_id, text).await,
        }
    }

    /// Ask whether free text should be translated
    async fn prompt(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()> {
        let token = self.tokens.store(text)?;
        let keyboard = InlineKeyboardMarkup {
            inline_keyboard: vec![vec![
                InlineKeyboardButton::callback(
                    messages::TRANSLATE_BUTTON,
                    callback::encode(ButtonOption::Translate, token),
                ),
                InlineKeyboardButton::callback(
                    messages::SKIP_BUTTON,
                    callback::encode(ButtonOption::Skip, token),
                ),
            ]],
        };

        self.channel
            .send_message(chat_id, messages::TRANSLATE_PROMPT, Some(message_id), Some(&keyboard))
            .await?;
        tracing::debug!(chat_id, %token, "translation prompt sent");
        Ok(())
    }

    async fn handle_callback(&self, query: &CallbackQuery) -> Result<()> {
        let result = self.resolve_callback(query).await;

        if let Err(e) = self.channel.answer_callback_query(&query.id, None).await {
            tracing::warn!(callback_id = %query.id, error = %e, "failed to answer callback query");
        }
        result
    }

    async fn resolve_callback(&self, query: &CallbackQuery) -> Result<()> {
        let Some((prompt, action)) = callback::plan(&self.tokens, query)? else {
            tracing::debug!(callback_id = %query.id, "callback without message, ignoring");
            return Ok(());
        };

        match action {
            CallbackAction::Unidentified => {
                self.channel
                    .edit_delivered(&prompt, messages::CALLBACK_DATA_MISSING)
                    .await
            }
            CallbackAction::Skip => self.channel.edit_delivered(&prompt, messages::SKIP).await,
            CallbackAction::Translate(query) => self.answer(&query).await,
        }
    }

    /// Run a query through the coordinator, replacing errors with a notice
    async fn answer(&self, query: &Query) -> Result<()> {
        match self.coordinator.handle(query).await {
            Ok(outcome) => {
                tracing::debug!(chat_id = query.chat_id, ?outcome, "query handled");
                Ok(())
            }
            Err(e) => {
                tracing::error!(chat_id = query.chat_id, user_id = query.user_id, error = %e, "query failed");
                match &query.delivery {
                    Delivery::Send { reply_to } => self
                        .channel
                        .deliver(query.chat_id, messages::SOMETHING_WRONG, reply_to.as_ref())
                        .await
                        .map(|_| ()),
                    Delivery::Edit(location) => {
                        self.channel
                            .edit_delivered(location, messages::SOMETHING_WRONG)
                            .await
                    }
                }
            }
        }
    }
}
