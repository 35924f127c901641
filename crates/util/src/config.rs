use std::{fmt, net::SocketAddr, time::Duration};

use url::Url;

use super::{env_var, server_bind_address};

pub const DEFAULT_DOMAIN_SUFFIX: &str = "expressitbd.com";
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_SSE_HEARTBEAT_SECS: u64 = 15;

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` when the current environment should behave as development.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    /// Base URL of the remote store API.
    pub api_endpoint: Url,
    /// Suffix appended to a subdomain before asking the API about it.
    pub domain_suffix: String,
    pub debounce: Duration,
    pub api_timeout: Duration,
    /// Idle lifetime of a form session before the sweeper drops it.
    pub session_ttl: Duration,
    pub sse_heartbeat: Duration,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env_var("APP_ENV") {
            Some(value) => Environment::from_str(&value)?,
            None => Environment::Development,
        };
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;

        let raw_endpoint = env_var("API_ENDPOINT").ok_or(ConfigError::MissingApiEndpoint)?;
        let api_endpoint = Url::parse(&raw_endpoint).map_err(ConfigError::ApiEndpoint)?;

        let domain_suffix = env_var("STORE_DOMAIN_SUFFIX")
            .map(|value| value.trim_start_matches('.').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_DOMAIN_SUFFIX.to_string());

        let debounce = Duration::from_millis(read_u64(
            "DOMAIN_CHECK_DEBOUNCE_MS",
            DEFAULT_DEBOUNCE_MS,
        )?);
        let api_timeout =
            Duration::from_secs(read_u64("API_TIMEOUT_SECS", DEFAULT_API_TIMEOUT_SECS)?);
        let session_ttl =
            Duration::from_secs(read_u64("FORM_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?);
        let sse_heartbeat =
            Duration::from_secs(read_u64("SSE_HEARTBEAT_SECS", DEFAULT_SSE_HEARTBEAT_SECS)?);

        Ok(Self {
            bind_addr,
            environment,
            api_endpoint,
            domain_suffix,
            debounce,
            api_timeout,
            session_ttl,
            sse_heartbeat,
        })
    }
}

fn read_u64(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env_var(key) {
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(default),
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    MissingApiEndpoint,
    ApiEndpoint(url::ParseError),
    InvalidNumber { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::MissingApiEndpoint => write!(f, "API_ENDPOINT must be set"),
            Self::ApiEndpoint(err) => write!(f, "invalid API_ENDPOINT value: {err}"),
            Self::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer (got {value})")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ENV_GUARD;
    use crate::DEFAULT_BIND_ADDR;
    use std::env;

    const KEYS: &[&str] = &[
        "APP_ENV",
        "APP_BIND_ADDR",
        "API_ENDPOINT",
        "STORE_DOMAIN_SUFFIX",
        "DOMAIN_CHECK_DEBOUNCE_MS",
        "API_TIMEOUT_SECS",
        "FORM_SESSION_TTL_SECS",
        "SSE_HEARTBEAT_SECS",
    ];

    fn clear_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_in_development() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("API_ENDPOINT", "https://api.example.com");

        let config = AppConfig::from_env().expect("config should load with defaults");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.api_endpoint.as_str(), "https://api.example.com/");
        assert_eq!(config.domain_suffix, DEFAULT_DOMAIN_SUFFIX);
        assert_eq!(config.debounce, Duration::from_millis(500));
        assert_eq!(config.session_ttl, Duration::from_secs(1800));

        clear_env();
    }

    #[test]
    fn rejects_invalid_environment() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("APP_ENV", "invalid");

        let err = AppConfig::from_env().expect_err("invalid env should error");
        assert!(matches!(err, ConfigError::InvalidEnvironment(value) if value == "invalid"));

        clear_env();
    }

    #[test]
    fn requires_api_endpoint() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("API_ENDPOINT", "   ");

        let err = AppConfig::from_env().expect_err("blank endpoint should error");
        assert!(matches!(err, ConfigError::MissingApiEndpoint));

        env::set_var("API_ENDPOINT", "not a url");
        let err = AppConfig::from_env().expect_err("malformed endpoint should error");
        assert!(matches!(err, ConfigError::ApiEndpoint(_)));

        clear_env();
    }

    #[test]
    fn parses_overrides() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("APP_ENV", "production");
        env::set_var("APP_BIND_ADDR", "0.0.0.0:9000");
        env::set_var("API_ENDPOINT", "http://localhost:4000/v1");
        env::set_var("STORE_DOMAIN_SUFFIX", ".shops.test");
        env::set_var("DOMAIN_CHECK_DEBOUNCE_MS", "250");
        env::set_var("SSE_HEARTBEAT_SECS", "5");

        let config = AppConfig::from_env().expect("config should load");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:9000");
        assert_eq!(config.domain_suffix, "shops.test");
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.sse_heartbeat, Duration::from_secs(5));

        clear_env();
    }

    #[test]
    fn rejects_non_numeric_durations() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("API_ENDPOINT", "https://api.example.com");
        env::set_var("DOMAIN_CHECK_DEBOUNCE_MS", "soon");

        let err = AppConfig::from_env().expect_err("non-numeric debounce should error");
        assert!(
            matches!(err, ConfigError::InvalidNumber { key, ref value } if key == "DOMAIN_CHECK_DEBOUNCE_MS" && value == "soon")
        );

        clear_env();
    }
}
