//! Render dictionary payloads as Telegram HTML

use std::fmt::Write as _;

use super::{Definition, LookupPayload, Translation};
use crate::{Error, Result};

const NBSP: char = '\u{a0}';

/// Turns a stored provider payload into display text
pub trait Formatter: Send + Sync {
    /// Render a raw payload
    ///
    /// # Errors
    ///
    /// Returns error if the payload cannot be parsed or has nothing to show
    fn render(&self, raw: &str) -> Result<String>;
}

/// Formatter for dictionary lookup responses
///
/// Output uses the tags Telegram accepts with `parse_mode: "HTML"`:
///
/// ```text
/// >>> hello
/// noun   [həˈləʊ]
///     привет    (hi; greeting)
///         hello there — привет
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DictionaryFormatter;

impl Formatter for DictionaryFormatter {
    fn render(&self, raw: &str) -> Result<String> {
        let payload: LookupPayload = serde_json::from_str(raw)?;
        let Some(first) = payload.def.first() else {
            return Err(Error::Provider("payload has no definitions".to_string()));
        };

        let mut out = format!("<code>&gt;&gt;&gt; {}</code>\n", escape_html(&first.text));
        for definition in &payload.def {
            render_definition(&mut out, definition);
        }

        Ok(out.trim_end().to_string())
    }
}

fn render_definition(out: &mut String, definition: &Definition) {
    let pos = definition.pos.as_deref().unwrap_or("—");
    let _ = write!(out, "<i>{}</i>", escape_html(pos));
    if let Some(ts) = definition.ts.as_deref().filter(|ts| !ts.is_empty()) {
        let _ = write!(out, "   <code>[{}]</code>", escape_html(ts));
    }
    out.push('\n');

    for translation in &definition.tr {
        render_translation(out, translation);
    }
}

fn render_translation(out: &mut String, translation: &Translation) {
    let indent: String = std::iter::repeat_n(NBSP, 4).collect();
    let _ = write!(out, "{indent}<b>{}</b>", escape_html(&translation.text));

    if !translation.mean.is_empty() {
        let meanings = translation
            .mean
            .iter()
            .map(|m| escape_html(&m.text))
            .collect::<Vec<_>>()
            .join("; ");
        let _ = write!(out, "    <code>({meanings})</code>");
    }
    out.push('\n');

    if let Some(example) = translation.ex.first() {
        let example_indent: String = std::iter::repeat_n(NBSP, 8).collect();
        let translations = example
            .tr
            .iter()
            .map(|t| escape_html(&t.text))
            .collect::<Vec<_>>()
            .join("//");
        let _ = writeln!(
            out,
            "{example_indent}{} — {translations}",
            escape_html(&example.text)
        );
    }
}

/// Escape the characters Telegram's HTML parser treats as markup
#[must_use]
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
