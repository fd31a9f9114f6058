//! Fixed user-facing texts

use crate::dictionary::escape_html;

/// Dialog prompt shown under free text
pub const TRANSLATE_PROMPT: &str = "Would you like to translate it?";

/// Label of the translate button
pub const TRANSLATE_BUTTON: &str = "tr";

/// Label of the skip button
pub const SKIP_BUTTON: &str = "skip";

/// Prompt replacement after the user pressed skip
pub const SKIP: &str = "Nevermind";

/// Reply to a button whose payload is gone
pub const CALLBACK_DATA_MISSING: &str = "Can't identify your request :(";

/// Notice that the same content was answered before in this chat
pub const ALREADY_REQUESTED: &str = "You've already requested that!";

/// Pointer message sent as a reply to the earlier answer
pub const POINTER: &str = "☝";

/// Reply to an empty query
pub const EMPTY_REQUEST: &str = "Your request is empty. Try again.";

/// Reply to a query made only of backticks
pub const ONLY_TILDE: &str = "There is only tilde, so check your input.";

/// Generic failure notice
pub const SOMETHING_WRONG: &str = "Sorry, something went wrong!";

/// Greeting for `/start`
pub const WELCOME: &str = "Send me a word or use /tr &lt;word&gt; to look it up. /stats shows the most requested words.";

/// Reply when no statistics exist yet
pub const NO_STATS: &str = "Nothing has been requested yet.";

/// Reply to a query the dictionary knows nothing about
#[must_use]
pub fn cant_find(query: &str) -> String {
    format!(
        "Sorry, can't find anything for <code>{}</code>.",
        escape_html(query)
    )
}

/// One line of the `/stats` listing
#[must_use]
pub fn stats_line(content: &str, count: i64) -> String {
    format!("<b>{}:</b> {count}", escape_html(content))
}

/// Footer of the `/stats` listing
#[must_use]
pub fn chat_total(answers: i64) -> String {
    match answers {
        1 => "1 word answered in this chat".to_string(),
        n => format!("{n} words answered in this chat"),
    }
}
