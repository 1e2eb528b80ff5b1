//! Database credentials read from a flat `KEY=VALUE` file.
//!
//! Blank lines and lines starting with `#` are ignored. Every other line is
//! split at its first `=`. Values are taken verbatim: quotes, `$` and `#` are
//! not interpreted. `LYNKS_`-prefixed environment variables
//! (`LYNKS_POSTGRES_PASSWORD`) win over the file.
use crate::ENV_PREFIX;
use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::path::Path;

const USER_KEY: &str = "POSTGRES_USER";
const PASSWORD_KEY: &str = "POSTGRES_PASSWORD";
const DATABASE_KEY: &str = "POSTGRES_DB";

/// Connection settings for the Lynks database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

#[derive(Debug, Deserialize)]
struct RawCredentials {
    postgres_user: Option<String>,
    postgres_password: Option<String>,
    postgres_db: Option<String>,
}

impl DatabaseSettings {
    pub const HOST: &'static str = "127.0.0.1";
    pub const PORT: u16 = 5432;

    /// Read credentials from an env file, overlaid by `LYNKS_` variables.
    ///
    /// A missing key is reported by name:
    ///
    /// ```
    /// use lynks_config::DatabaseSettings;
    ///
    /// let err = DatabaseSettings::from_pairs([("POSTGRES_USER", "lynks")]).unwrap_err();
    /// assert!(err.to_string().contains("POSTGRES_PASSWORD"));
    /// ```
    pub fn from_env_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Message(format!(
                "failed to read credentials file {}: {e}",
                path.display()
            ))
        })?;
        let pairs = parse_env_lines(&text).map_err(|line| {
            ConfigError::Message(format!("malformed line {line} in {}", path.display()))
        })?;
        Self::from_pairs(pairs)
    }

    /// Build settings from already parsed `KEY=VALUE` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut builder = Config::builder();
        for (key, value) in pairs {
            // File values are defaults so the environment wins. Keys are lowercased to match it.
            let key = key.as_ref();
            if ![USER_KEY, PASSWORD_KEY, DATABASE_KEY].contains(&key) {
                continue;
            }
            builder = builder.set_default(key.to_ascii_lowercase(), value.into())?;
        }
        let cfg = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;

        let raw: RawCredentials = cfg.try_deserialize()?;
        Ok(Self {
            host: Self::HOST.to_string(),
            port: Self::PORT,
            user: require(raw.postgres_user, USER_KEY)?,
            password: require(raw.postgres_password, PASSWORD_KEY)?,
            database: require(raw.postgres_db, DATABASE_KEY)?,
        })
    }
}

/// `KEY=VALUE` pairs in file order. Err carries the 1-based number of a line without `=`.
fn parse_env_lines(text: &str) -> Result<Vec<(&str, &str)>, usize> {
    let mut pairs = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let (key, value) = line.trim().split_once('=').ok_or(idx + 1)?;
        pairs.push((key, value));
    }
    Ok(pairs)
}

fn require(value: Option<String>, key: &str) -> Result<String, ConfigError> {
    value.ok_or_else(|| ConfigError::Message(format!("missing required key {key}")))
}
