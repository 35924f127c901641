//! Process-level plumbing shared by the store setup binaries: `.env`
//! loading, environment lookups and [`AppConfig`].

pub mod config;

use std::{env, net::SocketAddr, path::PathBuf};

pub use config::{AppConfig, ConfigError, Environment};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Reads `.env` from the working directory or a parent, if one exists.
/// Returns the path that was loaded.
pub fn load_env_file() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

/// Trimmed value of `key`, or `None` when unset or blank.
pub fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `APP_BIND_ADDR`, or [`DEFAULT_BIND_ADDR`] when unset.
pub fn server_bind_address() -> Result<SocketAddr, std::net::AddrParseError> {
    env_var("APP_BIND_ADDR")
        .as_deref()
        .unwrap_or(DEFAULT_BIND_ADDR)
        .parse()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ENV_GUARD;

    #[test]
    fn bind_address_defaults_when_unset_or_blank() {
        let _lock = ENV_GUARD.lock().expect("env guard poisoned");
        env::remove_var("APP_BIND_ADDR");
        let addr = server_bind_address().expect("default address is valid");
        assert_eq!(addr.to_string(), DEFAULT_BIND_ADDR);

        env::set_var("APP_BIND_ADDR", "   ");
        let addr = server_bind_address().expect("blank falls back");
        assert_eq!(addr.to_string(), DEFAULT_BIND_ADDR);
        env::remove_var("APP_BIND_ADDR");
    }

    #[test]
    fn bind_address_reads_env() {
        let _lock = ENV_GUARD.lock().expect("env guard poisoned");
        env::set_var("APP_BIND_ADDR", " 0.0.0.0:9000 ");
        let addr = server_bind_address().expect("custom address should parse");
        assert_eq!(addr.to_string(), "0.0.0.0:9000");

        env::set_var("APP_BIND_ADDR", "localhost");
        assert!(server_bind_address().is_err());
        env::remove_var("APP_BIND_ADDR");
    }

    #[test]
    fn env_var_trims_and_skips_blank() {
        let _lock = ENV_GUARD.lock().expect("env guard poisoned");
        env::set_var("STORE_SETUP_UTIL_SAMPLE_KEY", "  value ");
        assert_eq!(
            env_var("STORE_SETUP_UTIL_SAMPLE_KEY").as_deref(),
            Some("value")
        );

        env::set_var("STORE_SETUP_UTIL_SAMPLE_KEY", "");
        assert_eq!(env_var("STORE_SETUP_UTIL_SAMPLE_KEY"), None);
        env::remove_var("STORE_SETUP_UTIL_SAMPLE_KEY");
    }
}
