/// Configuration utilities - loading, reloading, and access helpers
///
/// - Loading configuration from disk
/// - Hot-reloading configuration at runtime
/// - Thread-safe access helpers
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::path::Path;

use super::schemas::Config;
use crate::errors::ConfigError;
use crate::logger::{self, LogTag};

/// Global configuration instance
///
/// Access it using the helper functions below. Components receive their own
/// section by value at construction and never read this directly.
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

/// Parse a configuration file, falling back to defaults when it does not exist
pub fn read_config_file(path: &str) -> Result<Config, ConfigError> {
    if !Path::new(path).exists() {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path),
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    toml::from_str::<Config>(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Load configuration from disk and initialize the global CONFIG
pub fn load_config() -> Result<(), ConfigError> {
    load_config_from_path(CONFIG_FILE_PATH)
}

/// Load configuration from a specific file path
pub fn load_config_from_path(path: &str) -> Result<(), ConfigError> {
    let config = read_config_file(path)?;

    CONFIG
        .set(RwLock::new(config))
        .map_err(|_| ConfigError::AlreadyInitialized)?;

    logger::debug(LogTag::Config, &format!("Configuration loaded from '{}'", path));
    Ok(())
}

/// Reload configuration from a specific file path
///
/// The configuration is atomically replaced, so reads are always consistent.
/// Running components keep the sections they were constructed with.
pub fn reload_config_from_path(path: &str) -> Result<(), ConfigError> {
    let new_config = read_config_file(path)?;

    match CONFIG.get() {
        Some(lock) => {
            *lock.write() = new_config;
            Ok(())
        }
        None => Err(ConfigError::NotInitialized),
    }
}

/// Run a closure against the current configuration
///
/// Uses defaults if `load_config` has not been called.
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    let lock = CONFIG.get_or_init(|| RwLock::new(Config::default()));
    let config = lock.read();
    f(&config)
}

/// Get a clone of the entire configuration
pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = read_config_file("/definitely/not/here/config.toml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_read_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[registry]\nclient_timeout_secs = 60\n\n[cache]\nttl_secs = 15\nredis_url = \"redis://localhost:6379\""
        )
        .unwrap();

        let config = read_config_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.registry.client_timeout_secs, 60);
        assert_eq!(config.registry.cleanup_interval_secs, 30);
        assert_eq!(config.cache.ttl_secs, 15);
        assert_eq!(config.cache.redis_url.as_deref(), Some("redis://localhost:6379"));
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[registry\nbroken").unwrap();

        let result = read_config_file(file.path().to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
