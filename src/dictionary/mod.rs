//! Dictionary provider and response rendering
//!
//! The provider answers a normalized query with an opaque payload (the raw
//! JSON body) that the lookup cache stores verbatim; the formatter turns a
//! payload into chat text.

mod format;
mod yandex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use format::{DictionaryFormatter, Formatter, escape_html};
pub use yandex::{DEFAULT_ENDPOINT, YandexDictionary};

/// Answer from a dictionary provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictionaryResult {
    /// Raw payload with at least one definition
    Found(String),
    /// The provider knows nothing about the query
    NotFound,
}

/// External dictionary service
#[async_trait]
pub trait DictionaryProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Look up a normalized query
    ///
    /// # Errors
    ///
    /// Returns error if the service is unreachable or answers with an error
    async fn lookup(&self, query: &str) -> Result<DictionaryResult>;
}

/// Dictionary lookup response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupPayload {
    #[serde(default)]
    pub def: Vec<Definition>,
}

/// One dictionary article (a headword with a part of speech)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<String>,
    /// Transcription
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(default)]
    pub tr: Vec<Translation>,
}

/// A translation of a headword
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<String>,
    #[serde(default)]
    pub syn: Vec<TextItem>,
    #[serde(default)]
    pub mean: Vec<TextItem>,
    #[serde(default)]
    pub ex: Vec<Example>,
}

/// Bare text node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextItem {
    pub text: String,
}

/// Usage example with its translations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Example {
    pub text: String,
    #[serde(default)]
    pub tr: Vec<TextItem>,
}

/// Decide whether a provider body holds any definitions
///
/// # Errors
///
/// Returns error if the body is not a lookup response
pub fn classify(body: &str) -> Result<DictionaryResult> {
    let payload: LookupPayload = serde_json::from_str(body)?;
    if payload.def.is_empty() {
        Ok(DictionaryResult::NotFound)
    } else {
        Ok(DictionaryResult::Found(body.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_definitions_mean_not_found() {
        let body = r#"{"head":{},"def":[]}"#;
        assert_eq!(classify(body).unwrap(), DictionaryResult::NotFound);
    }

    #[test]
    fn missing_definitions_mean_not_found() {
        assert_eq!(classify("{}").unwrap(), DictionaryResult::NotFound);
    }

    #[test]
    fn definitions_keep_the_raw_body() {
        let body = r#"{"head":{},"def":[{"text":"cat","pos":"noun","tr":[{"text":"кошка"}]}]}"#;
        assert_eq!(
            classify(body).unwrap(),
            DictionaryResult::Found(body.to_string())
        );
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(classify("<html>").is_err());
    }
}
