//! Scrape configuration, read from `BRICKDEAL_*` environment variables with
//! sensible defaults. `.env` loading stays in the binaries (dotenvy).

use thiserror::Error;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_BACKOFF_BASE_SECS: u64 = 1;
const DEFAULT_CONCURRENCY: usize = 2;
/// Hard cap on batch concurrency, protecting both the retailer and the
/// database regardless of operator input.
pub const MAX_CONCURRENCY: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Knobs for the page client and the batch refresh loop.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Browser-like user agent sent on every page fetch.
    pub user_agent: String,
    /// Hard per-fetch timeout.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Additional attempts after the first failure for transient errors.
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries.
    pub backoff_base_secs: u64,
    /// Default worker count for batch refreshes; always clamped to
    /// `1..=MAX_CONCURRENCY` at the call site.
    pub concurrency: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_secs: DEFAULT_BACKOFF_BASE_SECS,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl ScrapeConfig {
    /// Reads configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnvVar`] when a set variable does not
    /// parse; unset variables fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::build(|key| std::env::var(key))
    }

    /// Core parsing logic, decoupled from the real environment so tests can
    /// drive it with a plain map lookup.
    fn build<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let parse_u64 = |var: &str, default: u64| -> Result<u64, ConfigError> {
            match lookup(var) {
                Ok(raw) => raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
                    var: var.to_owned(),
                    reason: e.to_string(),
                }),
                Err(_) => Ok(default),
            }
        };
        let parse_u32 = |var: &str, default: u32| -> Result<u32, ConfigError> {
            match lookup(var) {
                Ok(raw) => raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
                    var: var.to_owned(),
                    reason: e.to_string(),
                }),
                Err(_) => Ok(default),
            }
        };
        let parse_usize = |var: &str, default: usize| -> Result<usize, ConfigError> {
            match lookup(var) {
                Ok(raw) => raw.parse::<usize>().map_err(|e| ConfigError::InvalidEnvVar {
                    var: var.to_owned(),
                    reason: e.to_string(),
                }),
                Err(_) => Ok(default),
            }
        };

        Ok(Self {
            user_agent: lookup("BRICKDEAL_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_owned()),
            timeout_secs: parse_u64("BRICKDEAL_FETCH_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
            connect_timeout_secs: parse_u64(
                "BRICKDEAL_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
            max_retries: parse_u32("BRICKDEAL_FETCH_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            backoff_base_secs: parse_u64(
                "BRICKDEAL_FETCH_BACKOFF_BASE_SECS",
                DEFAULT_BACKOFF_BASE_SECS,
            )?,
            concurrency: parse_usize("BRICKDEAL_REFRESH_CONCURRENCY", DEFAULT_CONCURRENCY)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn build_from(map: &HashMap<&str, &str>) -> Result<ScrapeConfig, ConfigError> {
        ScrapeConfig::build(|key| {
            map.get(key)
                .map(|v| (*v).to_owned())
                .ok_or(VarError::NotPresent)
        })
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let config = build_from(&HashMap::new()).unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.concurrency, 2);
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn overrides_are_read() {
        let map = HashMap::from([
            ("BRICKDEAL_FETCH_TIMEOUT_SECS", "5"),
            ("BRICKDEAL_REFRESH_CONCURRENCY", "4"),
        ]);
        let config = build_from(&map).unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn invalid_values_error_with_the_var_name() {
        let map = HashMap::from([("BRICKDEAL_FETCH_TIMEOUT_SECS", "soon")]);
        let err = build_from(&map).unwrap_err();
        let ConfigError::InvalidEnvVar { var, .. } = err;
        assert_eq!(var, "BRICKDEAL_FETCH_TIMEOUT_SECS");
    }
}
