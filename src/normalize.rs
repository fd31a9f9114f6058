//! Query normalization
//!
//! Turns free user text into the content key used by the lookup cache:
//! backticks are removed (they collide with the reply markup), letters are
//! case-folded, punctuation is dropped and whitespace collapsed. Hyphens and
//! apostrophes survive when they join two word characters, so `well-known`
//! and `don't` keep their shape.

/// Character that breaks the inline-code markup of replies
const MARKUP_COLLISION: char = '`';

/// Result of normalizing a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// A usable content key
    Query(String),
    /// Nothing was typed, or nothing but punctuation
    Empty,
    /// Only backticks were typed
    OnlyMarkup,
}

/// Normalize raw user input into a content key
#[must_use]
pub fn normalize(input: &str) -> Normalized {
    if input.trim().is_empty() {
        return Normalized::Empty;
    }

    let stripped: String = input.chars().filter(|&c| c != MARKUP_COLLISION).collect();
    if stripped.trim().is_empty() {
        return Normalized::OnlyMarkup;
    }

    let folded = stripped.to_lowercase();
    let chars: Vec<char> = folded.chars().collect();
    let mut cleaned = String::with_capacity(folded.len());

    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() || c.is_whitespace() {
            cleaned.push(c);
        } else if is_joiner(c) {
            let before = i.checked_sub(1).and_then(|j| chars.get(j));
            let after = chars.get(i + 1);
            if before.is_some_and(|b| b.is_alphanumeric()) && after.is_some_and(|a| a.is_alphanumeric()) {
                cleaned.push(c);
            } else {
                cleaned.push(' ');
            }
        } else {
            cleaned.push(' ');
        }
    }

    let key = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if key.is_empty() {
        Normalized::Empty
    } else {
        Normalized::Query(key)
    }
}

/// Punctuation kept inside a word
const fn is_joiner(c: char) -> bool {
    matches!(c, '-' | '\'' | '’')
}
