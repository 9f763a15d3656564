/// Error types for statshub
///
/// One enum per failure class. Each class has a fixed degradation policy:
/// - validation errors go back to the originating connection
/// - source (aggregation) errors skip the broadcast for that cycle
/// - cache errors are logged and the fallback tier is used
/// - transport errors evict the connection
use thiserror::Error;

// =============================================================================
// MAIN ERROR TYPE
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum StatsHubError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

pub type StatsHubResult<T> = Result<T, StatsHubError>;

// =============================================================================
// CACHE ERRORS
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("primary cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache operation '{operation}' failed: {reason}")]
    Operation { operation: &'static str, reason: String },

    #[error("cached payload could not be encoded: {0}")]
    Encoding(String),
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
            CacheError::Unavailable(e.to_string())
        } else {
            CacheError::Operation {
                operation: "redis",
                reason: e.to_string(),
            }
        }
    }
}

// =============================================================================
// RAW DATA SOURCE ERRORS
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("failed to fetch {collection}: {reason}")]
    Fetch { collection: &'static str, reason: String },

    #[error("malformed {collection} payload: {reason}")]
    Malformed { collection: &'static str, reason: String },

    #[error("invalid source configuration: {0}")]
    Config(String),
}

// =============================================================================
// INBOUND MESSAGE VALIDATION ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Message must be a JSON object")]
    NotAnObject,

    #[error("Missing or invalid message type")]
    MissingType,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Message data must be an object")]
    DataNotObject,

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

// =============================================================================
// TRANSPORT ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport is not open")]
    NotOpen,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("outbound queue full")]
    QueueFull,

    #[error("response could not be serialized: {0}")]
    Serialization(String),
}

// =============================================================================
// CONFIGURATION ERRORS
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config file '{path}': {reason}")]
    Parse { path: String, reason: String },

    #[error("config already initialized")]
    AlreadyInitialized,

    #[error("config not initialized, call load_config() first")]
    NotInitialized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err: StatsHubError = ValidationError::UnknownType("explode".to_string()).into();
        assert_eq!(err.to_string(), "Validation error: Unknown message type: explode");

        let err = SourceError::Fetch {
            collection: "results",
            reason: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "failed to fetch results: timeout");
    }
}
