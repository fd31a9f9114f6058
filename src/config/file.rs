//! TOML configuration file loading
//!
//! Supports `~/.config/glossa/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GlossaConfigFile {
    /// Verbose logging
    pub debug: Option<bool>,

    /// Telegram bot token
    pub bot_token: Option<String>,

    /// Yandex Dictionary API key
    pub yandex_key: Option<String>,

    /// Language pair, e.g. "en-ru"
    pub lang: Option<String>,

    /// Dictionary lookup endpoint
    pub endpoint: Option<String>,

    /// Directory for the database
    pub data_dir: Option<PathBuf>,

    /// Database file, overrides `data_dir`
    pub db_path: Option<PathBuf>,

    /// Bound on a dictionary lookup, in seconds
    pub provider_timeout_secs: Option<u64>,

    /// Pause between Telegram polls, in milliseconds
    pub poll_interval_ms: Option<u64>,
}

/// Read and parse a config file
///
/// # Errors
///
/// Returns error if the file can't be read or isn't valid TOML
pub fn read_config_file(path: &Path) -> Result<GlossaConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Load the config file
///
/// An explicitly given file must exist and parse. The default file is
/// optional: if it is missing or broken, defaults are used.
///
/// # Errors
///
/// Returns error only for an explicit path
pub fn load_config_file(explicit: Option<&Path>) -> Result<GlossaConfigFile> {
    if let Some(path) = explicit {
        return read_config_file(path);
    }

    let Some(path) = config_file_path() else {
        return Ok(GlossaConfigFile::default());
    };
    if !path.exists() {
        return Ok(GlossaConfigFile::default());
    }

    match read_config_file(&path) {
        Ok(config) => Ok(config),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            Ok(GlossaConfigFile::default())
        }
    }
}

/// Return the config file path: `~/.config/glossa/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("glossa").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let config: GlossaConfigFile = toml::from_str(
            r#"
            debug = true
            bot_token = "123:abc"
            lang = "en-de"
            "#,
        )
        .unwrap();

        assert_eq!(config.debug, Some(true));
        assert_eq!(config.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.lang.as_deref(), Some("en-de"));
        assert!(config.yandex_key.is_none());
        assert!(config.poll_interval_ms.is_none());
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(toml::from_str::<GlossaConfigFile>("bot_tokn = \"x\"").is_err());
    }

    #[test]
    fn explicit_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glossa.toml");
        std::fs::write(&path, "yandex_key = \"dict.1\"\nprovider_timeout_secs = 3\n").unwrap();

        let config = load_config_file(Some(&path)).unwrap();
        assert_eq!(config.yandex_key.as_deref(), Some("dict.1"));
        assert_eq!(config.provider_timeout_secs, Some(3));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config_file(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn broken_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "debug = [").unwrap();
        assert!(matches!(
            load_config_file(Some(&path)),
            Err(crate::Error::Toml(_))
        ));
    }
}
