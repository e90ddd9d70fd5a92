#![forbid(unsafe_code)]

use crate::IndexError;
use crate::dialect::Dialect;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_CONTAINS_LIMIT: usize = 50_000;
pub const DEFAULT_CACHE_SIZE: usize = 1_024;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 180_000;

const ENV_DIALECT: &str = "REPO_DB_DIALECT";
const ENV_CONTAINS_LIMIT: &str = "REPO_CONTAINS_LIMIT";
const ENV_CACHE_SIZE: &str = "REPO_CONTAINMENT_CACHE_SIZE";
const ENV_CACHE_TTL_SECS: &str = "REPO_CONTAINMENT_CACHE_TTL_SECS";
const ENV_SESSION_TIMEOUT_MS: &str = "REPO_SESSION_TIMEOUT_MS";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    pub dialect: Dialect,
    /// Rows fetched per cursor page.
    pub contains_limit: usize,
    /// Maximum entries per read-through cache.
    pub cache_size: usize,
    pub cache_ttl_secs: u64,
    /// Transaction expiry; also the sweep's fixed delay.
    pub session_timeout_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Sqlite,
            contains_limit: DEFAULT_CONTAINS_LIMIT,
            cache_size: DEFAULT_CACHE_SIZE,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
        }
    }
}

impl IndexConfig {
    pub fn from_json(raw: &str) -> Result<Self, IndexError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| IndexError::Config(err.to_string()))?;
        config.validate()
    }

    /// Defaults overridden by any `REPO_*` variables that are set.
    pub fn from_env() -> Result<Self, IndexError> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, IndexError> {
        if let Some(raw) = lookup(ENV_DIALECT) {
            self.dialect = raw.parse().map_err(IndexError::Config)?;
        }
        if let Some(raw) = lookup(ENV_CONTAINS_LIMIT) {
            self.contains_limit = parse_number(ENV_CONTAINS_LIMIT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CACHE_SIZE) {
            self.cache_size = parse_number(ENV_CACHE_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CACHE_TTL_SECS) {
            self.cache_ttl_secs = parse_number(ENV_CACHE_TTL_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SESSION_TIMEOUT_MS) {
            self.session_timeout_ms = parse_number(ENV_SESSION_TIMEOUT_MS, &raw)?;
        }
        self.validate()
    }

    pub fn validate(self) -> Result<Self, IndexError> {
        if self.contains_limit == 0 {
            return Err(IndexError::Config("contains_limit must be positive".into()));
        }
        if self.cache_size == 0 {
            return Err(IndexError::Config("cache_size must be positive".into()));
        }
        if self.session_timeout_ms == 0 {
            return Err(IndexError::Config(
                "session_timeout_ms must be positive".into(),
            ));
        }
        Ok(self)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, IndexError> {
    raw.trim()
        .parse()
        .map_err(|_| IndexError::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = IndexConfig::from_json(r#"{"contains_limit": 2, "dialect": "postgres"}"#)
            .expect("config should parse");
        assert_eq!(config.contains_limit, 2);
        assert_eq!(config.dialect, Dialect::Postgres);
        assert_eq!(config.cache_size, DEFAULT_CACHE_SIZE);
        assert_eq!(config.session_timeout(), Duration::from_millis(180_000));
    }

    #[test]
    fn json_rejects_unknown_fields_and_zero_limits() {
        assert!(IndexConfig::from_json(r#"{"bogus": 1}"#).is_err());
        let err = IndexConfig::from_json(r#"{"contains_limit": 0}"#).unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }

    #[test]
    fn env_overrides_apply_on_top_of_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("REPO_CONTAINS_LIMIT", "10"),
            ("REPO_SESSION_TIMEOUT_MS", "250"),
            ("REPO_DB_DIALECT", "mariadb"),
        ]);
        let config = IndexConfig::default()
            .with_env_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .expect("overrides should apply");
        assert_eq!(config.contains_limit, 10);
        assert_eq!(config.session_timeout_ms, 250);
        assert_eq!(config.dialect, Dialect::MariaDb);
        assert_eq!(config.cache_ttl_secs, DEFAULT_CACHE_TTL_SECS);

        let bad = IndexConfig::default()
            .with_env_overrides(|key| (key == "REPO_CACHE_SIZE_TYPO").then(String::new));
        assert!(bad.is_ok());
        let bad = IndexConfig::default()
            .with_env_overrides(|key| (key == "REPO_CONTAINMENT_CACHE_SIZE").then(|| "-1".into()));
        assert!(bad.is_err());
    }
}
