//! Yandex Dictionary API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{DictionaryProvider, DictionaryResult, classify};
use crate::{Error, Result};

/// Yandex Dictionary lookup endpoint
pub const DEFAULT_ENDPOINT: &str = "https://dictionary.yandex.net/api/v1/dicservice.json/lookup";

/// Error body returned by the API on failure
#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<i64>,
    message: Option<String>,
}

/// Yandex Dictionary client
pub struct YandexDictionary {
    client: Client,
    endpoint: String,
    api_key: String,
    lang: String,
}

impl YandexDictionary {
    /// Create a client for a language pair such as `en-ru`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        api_key: String,
        lang: String,
        endpoint: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("Glossa/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            lang,
        })
    }
}

#[async_trait]
impl DictionaryProvider for YandexDictionary {
    fn name(&self) -> &'static str {
        "yandex"
    }

    async fn lookup(&self, query: &str) -> Result<DictionaryResult> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("lang", self.lang.as_str()),
                ("text", query),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Error::Provider(format!(
                "{status}: {}",
                describe_error(&body)
            )));
        }

        let result = classify(&body)?;
        tracing::debug!(
            query,
            found = matches!(result, DictionaryResult::Found(_)),
            "dictionary lookup finished"
        );
        Ok(result)
    }
}

/// Best-effort readable message from an error body
fn describe_error(body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(ApiError {
            code,
            message: Some(message),
        }) => code.map_or_else(|| message.clone(), |code| format!("{message} (code {code})")),
        _ => body.chars().take(200).collect(),
    }
}
