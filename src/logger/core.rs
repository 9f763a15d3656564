/// Filtering entry point shared by the level functions
use super::config;
use super::levels::LogLevel;
use super::tags::LogTag;

pub fn should_log(tag: LogTag, level: LogLevel) -> bool {
    config::allows(tag, level)
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if should_log(tag, level) {
        super::format::format_and_log(tag, level, message);
    }
}
