//! Client configuration.
//!
//! The API key always comes from an environment variable (`API_KEY_ACS`
//! unless a config file names another). Everything else has defaults and
//! can be overridden from the environment or a TOML file:
//!
//! ```toml
//! api_key_env = "API_KEY_ACS"
//! base_url = "https://api.census.gov/data"
//! dictionary_dir = "tableids"
//! geography_dir = "geo"
//! timeout_secs = 60
//!
//! [rate_limit]
//! max_requests = 120
//! window_secs = 60
//!
//! [retry]
//! max_attempts = 5
//! base_delay_ms = 500
//! max_delay_ms = 16000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use lowe_geography::TABLES_DIR_ENV;

use crate::AcsError;

/// Default environment variable holding the API key.
pub const DEFAULT_API_KEY_ENV: &str = "API_KEY_ACS";

/// Environment variable overriding [`AcsConfig::base_url`].
pub const BASE_URL_ENV: &str = "LOWE_ACS_BASE_URL";

/// Environment variable overriding [`AcsConfig::dictionary_dir`].
pub const DICTIONARY_DIR_ENV: &str = "LOWE_ACS_DICT_DIR";

/// Root of the Census data API.
pub const DEFAULT_BASE_URL: &str = "https://api.census.gov/data";

/// Admission limit for requests to the ACS API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Requests admitted per window.
    pub max_requests: usize,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 120,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    /// Window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Per-cell retry policy for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay_ms: u64,
    /// Upper bound on a single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 16_000,
        }
    }
}

impl RetryConfig {
    /// Delay after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(20);
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}

/// Everything an [`crate::AcsClient`] needs to talk to the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcsConfig {
    /// API key sent with every data request.
    pub api_key: String,
    /// Name of the environment variable the key was read from (for error
    /// messages).
    pub api_key_env: String,
    /// Root of the data API; requests go to
    /// `{base_url}/{year}/acs/{survey}{suffix}`.
    pub base_url: String,
    /// Directory holding `{kind}_vars_{year}.json` dictionaries.
    pub dictionary_dir: PathBuf,
    /// Directory of generated lookup tables; `LOWE_GEO_DIR` overrides.
    pub geography_dir: Option<PathBuf>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Shared admission limit.
    pub rate_limit: RateLimitConfig,
    /// Per-cell retry policy.
    pub retry: RetryConfig,
}

impl AcsConfig {
    /// Configuration with defaults and the given key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            dictionary_dir: PathBuf::from("tableids"),
            geography_dir: None,
            timeout: Duration::from_secs(60),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Reads the key from `API_KEY_ACS` and the optional
    /// `LOWE_ACS_BASE_URL`, `LOWE_ACS_DICT_DIR` and `LOWE_GEO_DIR` overrides.
    ///
    /// # Errors
    ///
    /// Returns [`AcsError::MissingApiKey`] if the key variable is unset or
    /// empty.
    pub fn from_env() -> Result<Self, AcsError> {
        Self::from_file_config(ConfigFile::default())
    }

    /// Parses a TOML configuration; the key is still read from the
    /// environment variable it names.
    ///
    /// # Errors
    ///
    /// Returns [`AcsError::Config`] for invalid TOML and
    /// [`AcsError::MissingApiKey`] if the key variable is unset.
    pub fn from_toml_str(toml: &str) -> Result<Self, AcsError> {
        let file: ConfigFile = toml::from_str(toml).map_err(|e| AcsError::Config {
            message: format!("Failed to parse config: {e}"),
        })?;
        Self::from_file_config(file)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`AcsError`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self, AcsError> {
        log::debug!("Loading ACS config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn from_file_config(file: ConfigFile) -> Result<Self, AcsError> {
        let api_key_env = file
            .api_key_env
            .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string());
        let api_key = std::env::var(&api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AcsError::MissingApiKey {
                var: api_key_env.clone(),
            })?;

        let mut config = Self::new(api_key.trim());
        config.api_key_env = api_key_env;

        if let Some(url) = std::env::var(BASE_URL_ENV).ok().or(file.base_url) {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = std::env::var(DICTIONARY_DIR_ENV)
            .ok()
            .map(PathBuf::from)
            .or(file.dictionary_dir)
        {
            config.dictionary_dir = dir;
        }
        if let Some(dir) = std::env::var(TABLES_DIR_ENV)
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .or(file.geography_dir)
        {
            config.geography_dir = Some(dir);
        }
        if let Some(secs) = file.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(rate_limit) = file.rate_limit {
            config.rate_limit = rate_limit;
        }
        if let Some(retry) = file.retry {
            config.retry = retry;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that the key is present and the limits are usable.
    ///
    /// # Errors
    ///
    /// Returns [`AcsError::MissingApiKey`] for an empty key and
    /// [`AcsError::Config`] for zero limits.
    pub fn validate(&self) -> Result<(), AcsError> {
        if self.api_key.trim().is_empty() {
            return Err(AcsError::MissingApiKey {
                var: self.api_key_env.clone(),
            });
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            return Err(AcsError::Config {
                message: "rate_limit.max_requests and rate_limit.window_secs must be positive"
                    .to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(AcsError::Config {
                message: "retry.max_attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// On-disk TOML shape; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_key_env: Option<String>,
    base_url: Option<String>,
    dictionary_dir: Option<PathBuf>,
    geography_dir: Option<PathBuf>,
    timeout_secs: Option<u64>,
    rate_limit: Option<RateLimitConfig>,
    retry: Option<RetryConfig>,
}
