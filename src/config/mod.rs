//! Configuration management
//!
//! Sources, lowest priority first: built-in defaults, the TOML config file,
//! environment variables.

pub mod file;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::coordinator::DEFAULT_PROVIDER_TIMEOUT;
use crate::dictionary::DEFAULT_ENDPOINT;
use crate::{Error, Result};

pub use file::{GlossaConfigFile, config_file_path, load_config_file};

/// Default language pair
pub const DEFAULT_LANG: &str = "en-ru";

/// Default pause between Telegram polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Database file name inside the data directory
const DB_FILE: &str = "glossa.db";

/// Glossa configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Verbose logging
    pub debug: bool,
    /// Telegram bot token
    pub telegram_token: Option<String>,
    /// Dictionary provider settings
    pub dictionary: DictionaryConfig,
    /// Data directory
    pub data_dir: PathBuf,
    /// Database file
    pub db_path: PathBuf,
    /// Pause between Telegram polls
    pub poll_interval: Duration,
}

/// Dictionary provider settings
#[derive(Debug, Clone)]
pub struct DictionaryConfig {
    /// Yandex Dictionary API key
    pub api_key: Option<String>,
    /// Language pair
    pub lang: String,
    /// Lookup endpoint
    pub endpoint: String,
    /// Bound on a single lookup
    pub timeout: Duration,
}

/// Default data directory, `~/.local/share/glossa` on Linux
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "glossa", "glossa")
        .map_or_else(|| PathBuf::from(".glossa"), |d| d.data_dir().to_path_buf())
}

impl Config {
    /// Load configuration from the config file and the environment
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file can't be loaded or a numeric
    /// setting doesn't parse
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let file = load_config_file(config_path)?;
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with variables from `env`
    ///
    /// Empty variables count as unset.
    ///
    /// # Errors
    ///
    /// Returns error if a numeric variable doesn't parse
    pub fn from_sources<F>(file: GlossaConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let data_dir = var("GLOSSA_DATA_DIR")
            .map(PathBuf::from)
            .or(file.data_dir)
            .unwrap_or_else(default_data_dir);

        let db_path = var("GLOSSA_DB_PATH")
            .map(PathBuf::from)
            .or(file.db_path)
            .unwrap_or_else(|| data_dir.join(DB_FILE));

        let timeout = parse_var::<u64>(&var, "GLOSSA_PROVIDER_TIMEOUT_SECS")?
            .or(file.provider_timeout_secs)
            .map_or(DEFAULT_PROVIDER_TIMEOUT, Duration::from_secs);

        let poll_interval = parse_var::<u64>(&var, "GLOSSA_POLL_INTERVAL_MS")?
            .or(file.poll_interval_ms)
            .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis);

        Ok(Self {
            debug: file.debug.unwrap_or(false),
            telegram_token: var("TELEGRAM_BOT_TOKEN").or(file.bot_token),
            dictionary: DictionaryConfig {
                api_key: var("YANDEX_DICT_KEY").or(file.yandex_key),
                lang: var("GLOSSA_LANG")
                    .or(file.lang)
                    .unwrap_or_else(|| DEFAULT_LANG.to_string()),
                endpoint: file.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
                timeout,
            },
            data_dir,
            db_path,
            poll_interval,
        })
    }

    /// Telegram bot token, required to run the bot
    ///
    /// # Errors
    ///
    /// Returns error if no token is configured
    pub fn require_telegram_token(&self) -> Result<&str> {
        self.telegram_token.as_deref().ok_or_else(|| {
            Error::Config("Telegram bot token missing (TELEGRAM_BOT_TOKEN or bot_token)".to_string())
        })
    }

    /// Dictionary API key, required for lookups
    ///
    /// # Errors
    ///
    /// Returns error if no key is configured
    pub fn require_dictionary_key(&self) -> Result<&str> {
        self.dictionary.api_key.as_deref().ok_or_else(|| {
            Error::Config("dictionary API key missing (YANDEX_DICT_KEY or yandex_key)".to_string())
        })
    }
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    var(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{key} must be a number, got {value:?}")))
        })
        .transpose()
}
