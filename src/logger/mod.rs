//! Structured tag-based logging for statshub
//!
//! This module provides a small, ergonomic logging API with:
//! - Automatic debug mode filtering from command-line arguments
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-subsystem debug control via --debug-<tag> flags
//! - Colored console output with aligned tags
//!
//! ## Usage
//!
//! ```rust
//! use statshub::logger::{self, LogTag};
//!
//! logger::error(LogTag::Cache, "Primary cache unreachable");
//! logger::warning(LogTag::Registry, "Evicting idle client");
//! logger::info(LogTag::System, "statshub starting up");
//! logger::debug(LogTag::Coordinator, "Debounce window restarted"); // Only if --debug-coordinator
//! logger::verbose(LogTag::Protocol, "Raw frame: ..."); // Only if --verbose
//! ```
//!
//! ## Initialization
//!
//! Call once at startup (in main.rs):
//! ```rust
//! statshub::logger::init();
//! ```

mod config;
mod core;
mod format;
mod levels;
mod tags;

pub use config::LoggerConfig;
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system
///
/// Scans command-line arguments for --debug-<tag>, --verbose and --quiet flags
/// and installs the resulting filter configuration.
pub fn init() {
    config::init_from_args();
}

/// Log at ERROR level (always shown, critical issues)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (important issues)
///
/// Warnings are shown by default (unless --quiet is used).
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (detailed diagnostics)
///
/// Debug logs are ONLY shown when the --debug-<tag> flag is provided.
///
/// # Example
/// ```rust
/// // Only shown with --debug-cache flag
/// statshub::logger::debug(statshub::logger::LogTag::Cache, "fallback hit");
/// ```
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (very detailed tracing)
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}
