/// Log levels, ordered from most to least severe
///
/// A message is shown when its level is at or above the configured
/// threshold (`Error` is the most severe, `Verbose` the least).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    /// Gated per tag by --debug-<tag>
    Debug,
    /// Gated by --verbose or --verbose-<tag>
    Verbose,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Verbose => "VERBOSE",
        }
    }

    /// Within a threshold of `threshold`
    pub fn within(self, threshold: LogLevel) -> bool {
        self <= threshold
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold() {
        assert!(LogLevel::Error.within(LogLevel::Warning));
        assert!(LogLevel::Info.within(LogLevel::Info));
        assert!(!LogLevel::Debug.within(LogLevel::Info));
        assert!(LogLevel::Debug.within(LogLevel::Verbose));
    }
}
