/// Logger filter configuration derived from command-line flags
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

use super::levels::LogLevel;
use super::tags::LogTag;
use crate::arguments::{get_cmd_args, has_arg};

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Least severe level that can be displayed
    pub min_level: LogLevel,

    /// Tags with debug output enabled (--debug-<tag>)
    pub debug_tags: HashSet<&'static str>,

    /// Tags with verbose output enabled (--verbose-<tag>)
    pub verbose_tags: HashSet<&'static str>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            verbose_tags: HashSet::new(),
        }
    }
}

impl LoggerConfig {
    /// Build from an argument list
    pub fn from_args(args: &[String]) -> Self {
        let has = |flag: &str| args.iter().any(|a| a == flag);
        let mut config = Self::default();

        for tag in LogTag::ALL {
            if has("--debug-all") || has(&format!("--debug-{}", tag.key())) {
                config.debug_tags.insert(tag.key());
            }
            if has(&format!("--verbose-{}", tag.key())) {
                config.verbose_tags.insert(tag.key());
            }
        }

        config.min_level = if has("--verbose") {
            LogLevel::Verbose
        } else if has("--quiet") {
            LogLevel::Warning
        } else if !config.debug_tags.is_empty() {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };
        config
    }

    /// Filtering rules:
    /// - errors always pass
    /// - verbose needs --verbose or --verbose-<tag>
    /// - debug needs --verbose or --debug-<tag>
    /// - everything else is compared against the threshold
    pub fn allows(&self, tag: LogTag, level: LogLevel) -> bool {
        match level {
            LogLevel::Error => true,
            LogLevel::Verbose => {
                self.min_level == LogLevel::Verbose || self.verbose_tags.contains(tag.key())
            }
            LogLevel::Debug => {
                level.within(self.min_level)
                    && (self.min_level == LogLevel::Verbose || self.debug_tags.contains(tag.key()))
            }
            LogLevel::Warning | LogLevel::Info => level.within(self.min_level),
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

/// Install the configuration described by the process arguments
pub fn init_from_args() {
    let config = LoggerConfig::from_args(&get_cmd_args());
    if has_arg("--quiet") && has_arg("--verbose") {
        eprintln!("--quiet and --verbose both given; --verbose wins");
    }
    set_logger_config(config);
}

pub(super) fn allows(tag: LogTag, level: LogLevel) -> bool {
    LOGGER_CONFIG.read().allows(tag, level)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_filters() {
        let config = LoggerConfig::from_args(&args(&["statshub"]));
        assert!(config.allows(LogTag::Cache, LogLevel::Info));
        assert!(!config.allows(LogTag::Cache, LogLevel::Debug));
        assert!(!config.allows(LogTag::Cache, LogLevel::Verbose));
    }

    #[test]
    fn test_debug_is_per_tag() {
        let config = LoggerConfig::from_args(&args(&["statshub", "--debug-cache"]));
        assert!(config.allows(LogTag::Cache, LogLevel::Debug));
        assert!(!config.allows(LogTag::Registry, LogLevel::Debug));
        assert!(config.allows(LogTag::Registry, LogLevel::Info));
    }

    #[test]
    fn test_quiet_keeps_errors_and_warnings() {
        let config = LoggerConfig::from_args(&args(&["statshub", "--quiet"]));
        assert!(config.allows(LogTag::System, LogLevel::Error));
        assert!(config.allows(LogTag::System, LogLevel::Warning));
        assert!(!config.allows(LogTag::System, LogLevel::Info));
    }

    #[test]
    fn test_verbose_tag() {
        let config = LoggerConfig::from_args(&args(&["statshub", "--verbose-protocol"]));
        assert!(config.allows(LogTag::Protocol, LogLevel::Verbose));
        assert!(!config.allows(LogTag::Events, LogLevel::Verbose));
    }
}
