//! SDK Configuration Settings
//!
//! Configuration types for the SDK clients, loaded from environment variables
//! (a `.env` file in the working directory is read first when present).

use std::time::Duration;

/// Production REST base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.public.com";

/// API credentials: a pre-issued bearer access token.
#[derive(Clone)]
pub struct Credentials {
    access_token: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(access_token: String) -> Self {
        Self { access_token }
    }

    /// Get the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// REST transport settings.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Base URL, without trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Polling scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Maximum concurrent blocking fetches and callbacks.
    pub worker_threads: usize,
    /// How long `stop()` waits for the scheduler thread.
    pub stop_timeout: Duration,
    /// Loop sleep when no subscription is active.
    pub default_interval: Duration,
    /// Base delay of the retry policy.
    pub retry_unit: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            worker_threads: 10,
            stop_timeout: Duration::from_secs(5),
            default_interval: Duration::from_secs(1),
            retry_unit: Duration::from_secs(1),
        }
    }
}

/// Async price stream settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Delay between stream steps.
    pub interval: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Complete SDK configuration.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// API credentials.
    pub credentials: Credentials,
    /// Default account for quotes and orders.
    pub account_id: String,
    /// REST transport settings.
    pub api: ApiSettings,
    /// Polling scheduler settings.
    pub scheduler: SchedulerSettings,
    /// Async price stream settings.
    pub stream: StreamSettings,
}

impl SdkConfig {
    /// Create a configuration with default settings.
    #[must_use]
    pub fn new(access_token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(access_token.into()),
            account_id: account_id.into(),
            api: ApiSettings::default(),
            scheduler: SchedulerSettings::default(),
            stream: StreamSettings::default(),
        }
    }

    /// Point the REST adapters at another base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();

        let access_token = required_env("PUBLIC_API_ACCESS_TOKEN")?;
        let account_id = required_env("PUBLIC_API_ACCOUNT_ID")?;

        let api = ApiSettings {
            base_url: std::env::var("PUBLIC_API_BASE_URL")
                .ok()
                .filter(|v| !v.is_empty())
                .map_or_else(
                    || ApiSettings::default().base_url,
                    |v| v.trim_end_matches('/').to_string(),
                ),
            timeout: parse_env_duration_secs(
                "PUBLIC_API_TIMEOUT_SECS",
                ApiSettings::default().timeout,
            ),
        };

        let scheduler = SchedulerSettings {
            worker_threads: parse_env_usize(
                "PUBLIC_API_POLL_WORKERS",
                SchedulerSettings::default().worker_threads,
            )
            .max(1),
            stop_timeout: parse_env_duration_millis(
                "PUBLIC_API_STOP_TIMEOUT_MS",
                SchedulerSettings::default().stop_timeout,
            ),
            default_interval: parse_env_duration_secs_f64(
                "PUBLIC_API_DEFAULT_POLL_SECS",
                SchedulerSettings::default().default_interval,
            ),
            retry_unit: parse_env_duration_millis(
                "PUBLIC_API_RETRY_UNIT_MS",
                SchedulerSettings::default().retry_unit,
            ),
        };

        let stream = StreamSettings {
            interval: parse_env_duration_millis(
                "PUBLIC_API_STREAM_INTERVAL_MS",
                StreamSettings::default().interval,
            ),
        };

        Ok(Self {
            credentials: Credentials::new(access_token),
            account_id,
            api,
            scheduler,
            stream,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn required_env(key: &str) -> Result<String, ConfigError> {
    let value = std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_secs_f64(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(default)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_redacted_debug() {
        let creds = Credentials::new("token-abc123".to_string());
        let debug = format!("{creds:?}");
        assert!(!debug.contains("token-abc123"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn config_debug_does_not_leak_token() {
        let config = SdkConfig::new("token-abc123", "acc-1");
        assert!(!format!("{config:?}").contains("token-abc123"));
    }

    #[test]
    fn scheduler_settings_defaults() {
        let settings = SchedulerSettings::default();
        assert_eq!(settings.worker_threads, 10);
        assert_eq!(settings.stop_timeout, Duration::from_secs(5));
        assert_eq!(settings.default_interval, Duration::from_secs(1));
        assert_eq!(settings.retry_unit, Duration::from_secs(1));
    }

    #[test]
    fn api_settings_defaults() {
        let settings = ApiSettings::default();
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.timeout, Duration::from_secs(10));
        assert_eq!(StreamSettings::default().interval, Duration::from_secs(1));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = SdkConfig::new("t", "acc-1").with_base_url("http://127.0.0.1:9000/");
        assert_eq!(config.api.base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        let key = "PUBLIC_API_TEST_UNSET_VARIABLE";
        assert_eq!(parse_env_usize(key, 7), 7);
        assert_eq!(
            parse_env_duration_secs_f64(key, Duration::from_millis(250)),
            Duration::from_millis(250)
        );
        assert!(matches!(
            required_env(key),
            Err(ConfigError::MissingEnvVar(name)) if name == key
        ));
    }
}
