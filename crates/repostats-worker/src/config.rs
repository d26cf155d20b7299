use chrono::NaiveDate;
use std::time::Duration;

use crate::{Error, Result};
use repostats_github::{FetchConfig, QueryFilters};

/// Process-wide configuration, built once per pipeline run and passed into
/// the Dispatcher/Worker/Merger constructors rather than read ambiently.
#[derive(Debug, Clone)]
pub struct Settings {
    pub github_token: String,
    pub github_api_base: String,
    pub database_url: Option<String>,
    pub fetch: FetchConfig,
    pub filters: QueryFilters,
    /// Attempts for the final result write before the run fails.
    pub store_write_attempts: u32,
    /// Base delay between store write attempts.
    pub store_write_backoff: Duration,
}

impl Settings {
    pub const DEFAULT_API_BASE: &'static str = "https://api.github.com";

    /// Read settings from the environment. `GITHUB_TOKEN` is required; the
    /// rest have defaults.
    pub fn from_env() -> Result<Self> {
        let github_token = std::env::var("GITHUB_TOKEN")
            .map_err(|_| Error::Config("GITHUB_TOKEN must be set".to_string()))?;

        Self::from_env_with(github_token, std::env::var("DATABASE_URL").ok())
    }

    /// Like [`from_env`](Self::from_env), with the token and database URL
    /// already resolved by the caller (the CLI takes both as flags).
    pub fn from_env_with(github_token: String, database_url: Option<String>) -> Result<Self> {
        let github_api_base = std::env::var("GITHUB_API_BASE")
            .unwrap_or_else(|_| Self::DEFAULT_API_BASE.to_string());

        let mut filters = QueryFilters::default();
        if let Ok(cutoff) = std::env::var("CREATED_BEFORE_DATE") {
            let parsed = cutoff.parse::<NaiveDate>().map_err(|e| {
                Error::Config(format!("invalid CREATED_BEFORE_DATE '{}': {}", cutoff, e))
            })?;
            filters.created_before = Some(parsed);
        }

        Ok(Self {
            github_token,
            github_api_base,
            database_url,
            fetch: FetchConfig::default(),
            filters,
            store_write_attempts: 3,
            store_write_backoff: Duration::from_secs(2),
        })
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| Error::Config("DATABASE_URL must be set".to_string()))
    }
}
