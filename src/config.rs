//! Runtime configuration.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults. Command-line flags override individual values.

use std::env;

use serde::{Deserialize, Serialize};

use crate::application::DEFAULT_COMMIT_ATTEMPTS;

pub const DEFAULT_DATABASE_PATH: &str = "ledger.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file
    pub database_path: String,

    /// Route the operator is logged in to
    pub route: Option<String>,

    /// Quote-and-commit attempts before a conflicting transaction is given up
    pub commit_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            route: None,
            commit_attempts: DEFAULT_COMMIT_ATTEMPTS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup("LEDGER_DB_PATH").filter(|p| !p.trim().is_empty()) {
            config.database_path = path;
        }

        config.route = lookup("LEDGER_ROUTE")
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        if let Some(raw) = lookup("LEDGER_COMMIT_ATTEMPTS") {
            config.commit_attempts = parse_attempts("LEDGER_COMMIT_ATTEMPTS", &raw)?;
        }

        Ok(config)
    }

    /// Apply command-line overrides on top of the loaded values.
    pub fn with_overrides(
        mut self,
        database_path: Option<String>,
        route: Option<String>,
        commit_attempts: Option<u32>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = database_path {
            self.database_path = path;
        }
        if let Some(route) = route {
            self.route = Some(route);
        }
        if let Some(attempts) = commit_attempts {
            if attempts == 0 {
                return Err(ConfigError::InvalidValue("--attempts".to_string()));
            }
            self.commit_attempts = attempts;
        }
        Ok(self)
    }
}

fn parse_attempts(key: &str, raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ConfigError::InvalidValue(key.to_string())),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.database_path, "ledger.db");
        assert_eq!(config.commit_attempts, 3);
        assert!(config.route.is_none());
    }

    #[test]
    fn test_reads_environment() {
        let config = Config::from_lookup(lookup(&[
            ("LEDGER_DB_PATH", "/tmp/route.db"),
            ("LEDGER_ROUTE", " North "),
            ("LEDGER_COMMIT_ATTEMPTS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.database_path, "/tmp/route.db");
        assert_eq!(config.route.as_deref(), Some("North"));
        assert_eq!(config.commit_attempts, 5);
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let err = Config::from_lookup(lookup(&[("LEDGER_COMMIT_ATTEMPTS", "0")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for LEDGER_COMMIT_ATTEMPTS");
        assert!(Config::from_lookup(lookup(&[("LEDGER_COMMIT_ATTEMPTS", "many")])).is_err());
    }

    #[test]
    fn test_overrides_win() {
        let config = Config::from_lookup(lookup(&[("LEDGER_ROUTE", "North")]))
            .unwrap()
            .with_overrides(Some("other.db".into()), Some("South".into()), Some(1))
            .unwrap();
        assert_eq!(config.database_path, "other.db");
        assert_eq!(config.route.as_deref(), Some("South"));
        assert_eq!(config.commit_attempts, 1);
    }
}
