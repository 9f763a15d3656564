/// Realtime message schema
///
/// Inbound: `{type, data?}` validated into `ClientMessage`.
/// Outbound: `{type, data?, error?, timestamp}` built as `ServerResponse`.
/// Timestamps are RFC 3339.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::TransportError;
use crate::stats::AggregateStats;

// ============================================================================
// TOPIC ENUM
// ============================================================================

/// Subscription topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    StatsUpdates,
    OperatorUpdates,
    ResultUpdates,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::StatsUpdates, Topic::OperatorUpdates, Topic::ResultUpdates];

    /// Get topic code string
    pub fn code(&self) -> &'static str {
        match self {
            Topic::StatsUpdates => "stats_updates",
            Topic::OperatorUpdates => "operator_updates",
            Topic::ResultUpdates => "result_updates",
        }
    }

    /// Parse topic from code string
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "stats_updates" => Some(Topic::StatsUpdates),
            "operator_updates" => Some(Topic::OperatorUpdates),
            "result_updates" => Some(Topic::ResultUpdates),
            _ => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// INBOUND MESSAGES
// ============================================================================

/// Inbound message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Subscribe,
    Unsubscribe,
    GetStats,
    GetTopOperators,
    GetTopProducts,
    GetGlobalStats,
}

impl MessageType {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "subscribe" => Some(MessageType::Subscribe),
            "unsubscribe" => Some(MessageType::Unsubscribe),
            "get_stats" => Some(MessageType::GetStats),
            "get_top_operators" => Some(MessageType::GetTopOperators),
            "get_top_products" => Some(MessageType::GetTopProducts),
            "get_global_stats" => Some(MessageType::GetGlobalStats),
            _ => None,
        }
    }
}

pub const DEFAULT_TOP_OPERATORS_LIMIT: usize = 10;
pub const DEFAULT_TOP_PRODUCTS_LIMIT: usize = 1;

/// A validated inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Raw topic names; unknown ones are filtered at dispatch
    Subscribe { events: Vec<String> },
    Unsubscribe { events: Vec<String> },
    GetStats { force_refresh: bool },
    GetTopOperators { limit: Option<usize> },
    GetTopProducts { limit: Option<usize> },
    GetGlobalStats,
}

// ============================================================================
// OUTBOUND RESPONSES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Stats,
    TopOperators,
    TopProducts,
    GlobalStats,
    Update,
    Error,
    Subscribed,
    Unsubscribed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    #[serde(rename = "type")]
    pub kind: ResponseType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl ServerResponse {
    pub fn new(kind: ResponseType, data: serde_json::Value) -> Self {
        Self {
            kind,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Serialize any payload into a response
    pub fn with_payload<T: Serialize>(kind: ResponseType, payload: &T) -> Result<Self, TransportError> {
        let data = serde_json::to_value(payload)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        Ok(Self::new(kind, data))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ResponseType::Error,
            data: None,
            error: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    /// Encode as a text frame
    pub fn to_json(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Serialization(e.to_string()))
    }
}

/// Why a `stats` response was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Initial,
    Keepalive,
    Requested,
}

/// `data` of a `stats` response
#[derive(Debug, Clone, Serialize)]
pub struct StatsPayload<'a> {
    #[serde(rename = "type")]
    pub kind: SnapshotKind,
    pub stats: &'a AggregateStats,
}

/// `data` of `subscribed` / `unsubscribed` responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPayload {
    pub subscribed_events: Vec<Topic>,
    pub total_subscriptions: usize,
}
