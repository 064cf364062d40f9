use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use api_client::{CatalogClient, DocumentClient, IdentityClient};
use tracing::{info, warn};

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct Config {
    pub api_key: String,
    pub project_id: String,
    pub books_api_key: Option<String>,
    pub data_dir: PathBuf,
    pub tick_period: Duration,
    pub search_debounce: Duration,
    pub identity_url: String,
    pub token_url: String,
    pub firestore_url: String,
    pub books_url: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            api_key: required("MONTSE_API_KEY")?,
            project_id: required("MONTSE_PROJECT_ID")?,
            books_api_key: optional("MONTSE_BOOKS_API_KEY"),
            data_dir: try_load("MONTSE_DATA_DIR", ".montse")?,
            tick_period: tick_period(try_load("MONTSE_TICK_SECONDS", "1")?)?,
            search_debounce: Duration::from_millis(try_load("MONTSE_SEARCH_DEBOUNCE_MS", "500")?),
            identity_url: try_load("MONTSE_IDENTITY_URL", IdentityClient::DEFAULT_BASE_URL)?,
            token_url: try_load("MONTSE_TOKEN_URL", IdentityClient::DEFAULT_TOKEN_URL)?,
            firestore_url: try_load("MONTSE_FIRESTORE_URL", DocumentClient::DEFAULT_BASE_URL)?,
            books_url: try_load("MONTSE_BOOKS_URL", CatalogClient::DEFAULT_BASE_URL)?,
        })
    }

    pub fn with_data_dir(self, data_dir: PathBuf) -> Self {
        Self { data_dir, ..self }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn required(key: &str) -> Result<String> {
    var(key).ok_or_else(|| Error::Config(format!("{key} must be set")))
}

fn optional(key: &str) -> Option<String> {
    let value = var(key);
    if value.is_none() {
        warn!("{key} not set, book search is unavailable");
    }
    value
}

fn tick_period(seconds: u64) -> Result<Duration> {
    if seconds == 0 {
        return Err(Error::Config("MONTSE_TICK_SECONDS must be at least 1".to_owned()));
    }
    Ok(Duration::from_secs(seconds))
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {key} value: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let period: u64 = try_load("MONTSE_TEST_UNSET_SECONDS", "1").expect("a number");
        assert_eq!(period, 1);

        let path: PathBuf = try_load("MONTSE_TEST_UNSET_DIR", ".montse").expect("a path");
        assert_eq!(path, PathBuf::from(".montse"));
    }

    #[test]
    fn ticking_needs_a_period() {
        assert_eq!(tick_period(2).expect("a period"), Duration::from_secs(2));
        assert!(matches!(tick_period(0), Err(Error::Config(..))));
    }

    #[test]
    fn bad_values_are_reported() {
        let result: Result<u64> = try_load("MONTSE_TEST_UNSET_NUMBER", "soon");
        assert!(matches!(result, Err(Error::Config(..))));
    }
}
