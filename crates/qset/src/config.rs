//! Runtime settings: dialect selection, database location and SQL logging.
//!
//! Settings load from a TOML file or from the environment (with `.env`
//! support via `dotenvy`):
//!
//! ```toml
//! dialect = "postgres"
//!
//! [database]
//! url = "${DATABASE_URL}"
//!
//! [sql_log]
//! enabled = true
//! level = "info"
//! max_sql_length = 120
//! ```
//!
//! `${VAR}` references in `database.url` and `database.path` are expanded
//! from the environment.

use crate::connection::LoggedConnection;
use crate::dialect::DialectKind;
use crate::error::{QueryError, QueryResult};
use serde::Deserialize;
use std::path::Path;
use tracing::Level;

/// Environment variables read by [`Settings::from_env`].
pub const ENV_DIALECT: &str = "QSET_DIALECT";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_DATABASE_PATH: &str = "QSET_DATABASE_PATH";
pub const ENV_SQL_LOG: &str = "QSET_SQL_LOG";
pub const ENV_SQL_LOG_LEVEL: &str = "QSET_SQL_LOG_LEVEL";
pub const ENV_SQL_LOG_MAX_LENGTH: &str = "QSET_SQL_LOG_MAX_LENGTH";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    #[serde(default = "default_dialect")]
    pub dialect: DialectKind,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub sql_log: SqlLogSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseSettings {
    /// Server connection string (PostgreSQL, T-SQL drivers).
    pub url: Option<String>,
    /// SQLite database file.
    #[serde(default = "default_path")]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SqlLogSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_max_sql_length")]
    pub max_sql_length: usize,
}

fn default_dialect() -> DialectKind {
    DialectKind::Sqlite
}

fn default_path() -> String {
    ":memory:".to_string()
}

fn default_level() -> String {
    "debug".to_string()
}

fn default_max_sql_length() -> usize {
    200
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
            database: DatabaseSettings::default(),
            sql_log: SqlLogSettings::default(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            path: default_path(),
        }
    }
}

impl Default for SqlLogSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: default_level(),
            max_sql_length: default_max_sql_length(),
        }
    }
}

impl SqlLogSettings {
    /// The configured tracing level.
    pub fn level(&self) -> QueryResult<Level> {
        self.level
            .parse::<Level>()
            .map_err(|_| QueryError::config(format!("invalid sql_log.level: {:?}", self.level)))
    }
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(raw: &str) -> QueryResult<Self> {
        let mut settings: Settings = toml::from_str(raw)
            .map_err(|e| QueryError::config(format!("failed to parse settings: {e}")))?;
        settings.expand_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and parse a TOML settings file.
    pub fn from_file(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            QueryError::config(format!("failed to read settings file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Load settings from the process environment, after loading `.env` if present.
    pub fn from_env() -> QueryResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an environment-like lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> QueryResult<Self> {
        let mut settings = Settings::default();
        if let Some(dialect) = lookup(ENV_DIALECT) {
            settings.dialect = dialect.parse()?;
        }
        settings.database.url = lookup(ENV_DATABASE_URL).filter(|u| !u.trim().is_empty());
        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            settings.database.path = path;
        }
        if let Some(enabled) = lookup(ENV_SQL_LOG) {
            settings.sql_log.enabled = parse_flag(ENV_SQL_LOG, &enabled)?;
        }
        if let Some(level) = lookup(ENV_SQL_LOG_LEVEL) {
            settings.sql_log.level = level;
        }
        if let Some(max) = lookup(ENV_SQL_LOG_MAX_LENGTH) {
            settings.sql_log.max_sql_length = max.trim().parse().map_err(|_| {
                QueryError::config(format!("{ENV_SQL_LOG_MAX_LENGTH} must be a number, got {max:?}"))
            })?;
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Wrap a connection in a [`LoggedConnection`] configured from `sql_log`.
    ///
    /// The wrapper is disabled when `sql_log.enabled` is false.
    pub fn logged<C>(&self, conn: C) -> QueryResult<LoggedConnection<C>> {
        let logged = LoggedConnection::new(conn)
            .level(self.sql_log.level()?)
            .max_sql_length(self.sql_log.max_sql_length);
        Ok(if self.sql_log.enabled {
            logged
        } else {
            logged.disable()
        })
    }

    /// Open the configured SQLite database.
    #[cfg(feature = "sqlite")]
    pub fn open_sqlite(&self) -> QueryResult<crate::connection::SqliteConnection> {
        crate::connection::SqliteConnection::open(&self.database.path)
    }

    fn expand_env(&mut self) -> QueryResult<()> {
        if let Some(url) = self.database.url.as_mut() {
            *url = expand_env_vars(url)?;
        }
        self.database.path = expand_env_vars(&self.database.path)?;
        Ok(())
    }

    fn validate(&self) -> QueryResult<()> {
        self.sql_log.level()?;
        if self.database.path.trim().is_empty() {
            return Err(QueryError::config("database.path must not be empty"));
        }
        if self.dialect != DialectKind::Sqlite && self.database.url.is_none() {
            tracing::debug!(
                target: "qset.query",
                dialect = %self.dialect,
                "no database.url configured"
            );
        }
        Ok(())
    }
}

fn parse_flag(key: &str, raw: &str) -> QueryResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(QueryError::config(format!("{key} must be a boolean, got {raw:?}"))),
    }
}

fn expand_env_vars(input: &str) -> QueryResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                return Err(QueryError::config(format!(
                    "unterminated env var reference: ${{{key}"
                )));
            }
            if key.is_empty() {
                return Err(QueryError::config("invalid env var reference: ${}"));
            }

            let v = std::env::var(&key)
                .map_err(|_| QueryError::config(format!("missing env var: {key}")))?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}
