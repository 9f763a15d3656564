/// Log tags identifying the subsystem that produced a message

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Events,
    Stats,
    Cache,
    Coordinator,
    Registry,
    Protocol,
    Webserver,
}

impl LogTag {
    /// All tags, used when enabling debug output globally
    pub const ALL: [LogTag; 9] = [
        LogTag::System,
        LogTag::Config,
        LogTag::Events,
        LogTag::Stats,
        LogTag::Cache,
        LogTag::Coordinator,
        LogTag::Registry,
        LogTag::Protocol,
        LogTag::Webserver,
    ];

    /// Key used for --debug-<key> and --verbose-<key> flags
    pub fn key(&self) -> &'static str {
        match self {
            LogTag::System => "system",
            LogTag::Config => "config",
            LogTag::Events => "events",
            LogTag::Stats => "stats",
            LogTag::Cache => "cache",
            LogTag::Coordinator => "coordinator",
            LogTag::Registry => "registry",
            LogTag::Protocol => "protocol",
            LogTag::Webserver => "webserver",
        }
    }

    /// Uppercase label without color codes
    pub fn to_plain_string(&self) -> String {
        self.key().to_uppercase()
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
