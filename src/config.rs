use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// File extensions the crawler will pick up.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["mp3", "mpeg", "wav", "ogg"];

/// Default ingestion root when `TARGET_DIR` is unset.
pub const DEFAULT_TARGET_DIR: &str = "/audio/raw";

/// Number of results returned by a recognition.
pub const DEFAULT_TOPN: usize = 2;

/// Bits kept from the front of a hash in older index layouts. The hashing
/// path stores all 64 bits; this stays here for index compatibility only.
pub const FINGERPRINT_REDUCTION: u32 = 20;

/// Backend connection settings, read from the environment.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl DbConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("DB_HOST").unwrap_or_else(|_| "localhost".into()),
            port: env_parse("DB_PORT", 5432)?,
            name: env::var("DB_NAME")
                .map_err(|_| Error::Config("DB_NAME is not set".into()))?,
            user: env::var("DB_USER")
                .map_err(|_| Error::Config("DB_USER is not set".into()))?,
            password: env::var("DB_PASSWORD").unwrap_or_default(),
        })
    }

    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

/// The backend URL: `DATABASE_URL` verbatim if present, otherwise composed
/// from the `DB_*` parts.
pub fn database_url() -> Result<String> {
    match env::var("DATABASE_URL") {
        Ok(url) => Ok(url),
        Err(_) => Ok(DbConfig::from_env()?.url()),
    }
}

/// Ingestion root directory.
pub fn target_dir() -> PathBuf {
    env::var("TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_TARGET_DIR))
}

/// How many candidates a recognition reports.
pub fn topn() -> Result<usize> {
    env_parse("TOPN", DEFAULT_TOPN)
}

/// Read an environment variable, falling back to `default` when unset.
/// A set-but-unparsable value is a configuration error, not a fallback.
pub(crate) fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key} must be a number, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}
