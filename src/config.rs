//! Runtime configuration read from the environment (and an optional `.env`).

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{LedgerError, LedgerResult};

pub const DATABASE_PATH_VAR: &str = "LEDGER_DATABASE_PATH";
pub const BUSY_TIMEOUT_VAR: &str = "LEDGER_BUSY_TIMEOUT_MS";
pub const POOL_SIZE_VAR: &str = "LEDGER_POOL_SIZE";
pub const CODE_ATTEMPTS_VAR: &str = "LEDGER_CODE_ATTEMPTS";
pub const LOG_VAR: &str = "LEDGER_LOG";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    /// How long a connection waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// Maximum number of idle connections kept by the pool.
    pub pool_size: usize,
    /// Random draws per code width before the generator widens the code.
    pub code_attempts: u32,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from("ledger.db"),
            busy_timeout: Duration::from_millis(5000),
            pool_size: 4,
            code_attempts: 32,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Config for a database file at `path`, everything else defaulted.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Config {
            database_path: path.into(),
            ..Config::default()
        }
    }

    pub fn from_env() -> LedgerResult<Self> {
        // A missing .env file is normal outside development.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LedgerResult<Self> {
        let mut config = Config::default();

        if let Some(path) = lookup(DATABASE_PATH_VAR) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(BUSY_TIMEOUT_VAR) {
            config.busy_timeout = Duration::from_millis(parse_number(BUSY_TIMEOUT_VAR, &raw)?);
        }
        if let Some(raw) = lookup(POOL_SIZE_VAR) {
            config.pool_size = parse_number(POOL_SIZE_VAR, &raw)?;
        }
        if let Some(raw) = lookup(CODE_ATTEMPTS_VAR) {
            config.code_attempts = parse_number(CODE_ATTEMPTS_VAR, &raw)?;
            if config.code_attempts == 0 {
                return Err(LedgerError::validation(format!(
                    "{} must be at least 1",
                    CODE_ATTEMPTS_VAR
                )));
            }
        }
        if let Some(filter) = lookup(LOG_VAR) {
            config.log_filter = filter;
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> LedgerResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| LedgerError::validation(format!("{} is not a valid number: {:?}", key, raw)))
}
