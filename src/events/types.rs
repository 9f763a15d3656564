/// Domain event types consumed by the statistics pipeline
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of mutation applied to a test result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    /// Action string carried in update metadata
    pub fn action(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
            EventKind::Deleted => "deleted",
        }
    }

    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "created" | "create" => Some(EventKind::Created),
            "updated" | "update" => Some(EventKind::Updated),
            "deleted" | "delete" => Some(EventKind::Deleted),
            _ => None,
        }
    }
}

/// A mutation of a test result record. Transient, never persisted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub kind: EventKind,
    pub result_id: String,
    pub operator_id: String,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(kind: EventKind, result_id: impl Into<String>, operator_id: impl Into<String>) -> Self {
        Self {
            kind,
            result_id: result_id.into(),
            operator_id: operator_id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn created(result_id: impl Into<String>, operator_id: impl Into<String>) -> Self {
        Self::new(EventKind::Created, result_id, operator_id)
    }

    pub fn updated(result_id: impl Into<String>, operator_id: impl Into<String>) -> Self {
        Self::new(EventKind::Updated, result_id, operator_id)
    }

    pub fn deleted(result_id: impl Into<String>, operator_id: impl Into<String>) -> Self {
        Self::new(EventKind::Deleted, result_id, operator_id)
    }

    /// Topic this event is published on
    pub fn topic(&self) -> EventTopic {
        EventTopic::for_kind(self.kind)
    }
}

/// Bus topics for result mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    #[serde(rename = "result.created")]
    ResultCreated,
    #[serde(rename = "result.updated")]
    ResultUpdated,
    #[serde(rename = "result.deleted")]
    ResultDeleted,
}

impl EventTopic {
    pub const ALL: [EventTopic; 3] = [
        EventTopic::ResultCreated,
        EventTopic::ResultUpdated,
        EventTopic::ResultDeleted,
    ];

    /// Get topic code string
    pub fn code(&self) -> &'static str {
        match self {
            EventTopic::ResultCreated => "result.created",
            EventTopic::ResultUpdated => "result.updated",
            EventTopic::ResultDeleted => "result.deleted",
        }
    }

    /// Parse topic from code string
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "result.created" => Some(EventTopic::ResultCreated),
            "result.updated" => Some(EventTopic::ResultUpdated),
            "result.deleted" => Some(EventTopic::ResultDeleted),
            _ => None,
        }
    }

    pub fn for_kind(kind: EventKind) -> Self {
        match kind {
            EventKind::Created => EventTopic::ResultCreated,
            EventKind::Updated => EventTopic::ResultUpdated,
            EventKind::Deleted => EventTopic::ResultDeleted,
        }
    }
}

impl fmt::Display for EventTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_topic_mapping() {
        let event = DomainEvent::deleted("r-9", "op-3");
        assert_eq!(event.topic(), EventTopic::ResultDeleted);
        assert_eq!(event.topic().code(), "result.deleted");
        assert_eq!(EventTopic::from_code("result.updated"), Some(EventTopic::ResultUpdated));
        assert_eq!(EventTopic::from_code("operator.created"), None);
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!(EventKind::from_action("created"), Some(EventKind::Created));
        assert_eq!(EventKind::from_action("delete"), Some(EventKind::Deleted));
        assert_eq!(EventKind::from_action("archived"), None);
    }
}
