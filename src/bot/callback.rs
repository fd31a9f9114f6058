//! Inline keyboard callback data
//!
//! Telegram limits `callback_data` to 64 bytes, so buttons carry only an
//! option and a [`TokenId`]; the text they refer to sits in the token store.
//! Wire format: `"<option>@<token>"`.

use std::fmt;

use crate::channels::LocationRef;
use crate::channels::telegram::{self, CallbackQuery};
use crate::coordinator::{Delivery, Query};
use crate::db::{TokenId, TokenStore};
use crate::{Error, Result};

/// What a dialog button asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonOption {
    /// Look the stored text up
    Translate,
    /// Drop the stored text
    Skip,
}

impl ButtonOption {
    const fn code(self) -> u8 {
        match self {
            Self::Translate => 1,
            Self::Skip => 2,
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Translate),
            "2" => Some(Self::Skip),
            _ => None,
        }
    }
}

impl fmt::Display for ButtonOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Translate => f.write_str("translate"),
            Self::Skip => f.write_str("skip"),
        }
    }
}

/// Callback data for a button
#[must_use]
pub fn encode(option: ButtonOption, token: TokenId) -> String {
    format!("{}@{token}", option.code())
}

/// Parse callback data produced by [`encode`]
///
/// # Errors
///
/// Returns [`Error::StaleToken`] if the data is malformed
pub fn decode(data: &str) -> Result<(ButtonOption, TokenId)> {
    let (option, token) = data
        .split_once('@')
        .ok_or_else(|| Error::StaleToken(format!("malformed callback data: {data:?}")))?;
    let option = ButtonOption::from_code(option)
        .ok_or_else(|| Error::StaleToken(format!("unknown button option: {option:?}")))?;
    Ok((option, token.parse()?))
}

/// What pressing a button resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// The data or its token is gone; tell the user
    Unidentified,
    /// Dismiss the prompt
    Skip,
    /// Answer the stored text in place of the prompt
    Translate(Query),
}

/// Resolve a button press against the token store
///
/// Returns the prompt's location with the action to take there, or `None`
/// if the callback carries no message. The token is consumed, so a second
/// press of the same button resolves to [`CallbackAction::Unidentified`].
///
/// # Errors
///
/// Returns error if the token store fails
pub fn plan(
    tokens: &TokenStore,
    query: &CallbackQuery,
) -> Result<Option<(LocationRef, CallbackAction)>> {
    let Some(message) = &query.message else {
        return Ok(None);
    };
    let prompt = telegram::location(message.chat.id, message.message_id);

    let decoded = match query.data.as_deref().map(decode).transpose() {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::debug!(callback_id = %query.id, error = %e, "undecodable callback data");
            None
        }
    };
    let Some((option, token)) = decoded else {
        return Ok(Some((prompt, CallbackAction::Unidentified)));
    };
    let Some(text) = tokens.take_once(token)? else {
        tracing::debug!(callback_id = %query.id, %token, "callback token already used or expired");
        return Ok(Some((prompt, CallbackAction::Unidentified)));
    };

    let action = match option {
        ButtonOption::Skip => CallbackAction::Skip,
        ButtonOption::Translate => CallbackAction::Translate(Query {
            chat_id: message.chat.id,
            user_id: query.from.id,
            text,
            delivery: Delivery::Edit(prompt.clone()),
        }),
    };
    Ok(Some((prompt, action)))
}
