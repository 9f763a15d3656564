/// Inbound message validation
///
/// Parses a raw text frame and checks it against the message schema:
/// - the frame is a JSON object with a string `type`
/// - `type` is one of the known message types
/// - `data`, when present, is an object with only known fields:
///   `events: string[]`, `limit: integer 1..=100`, `force_refresh: bool`
use serde_json::{Map, Value};

use super::message::{ClientMessage, MessageType};
use crate::errors::ValidationError;

pub const MIN_LIMIT: u64 = 1;
pub const MAX_LIMIT: u64 = 100;

const KNOWN_FIELDS: [&str; 3] = ["events", "limit", "force_refresh"];

/// Parse and validate one inbound frame
pub fn parse_message(text: &str) -> Result<ClientMessage, ValidationError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ValidationError::InvalidJson(e.to_string()))?;
    validate_message(&value)
}

pub fn validate_message(value: &Value) -> Result<ClientMessage, ValidationError> {
    let object = value.as_object().ok_or(ValidationError::NotAnObject)?;

    let type_code = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingType)?;
    let message_type = MessageType::from_code(type_code)
        .ok_or_else(|| ValidationError::UnknownType(type_code.to_string()))?;

    let empty = Map::new();
    let data = match object.get("data") {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(map)) => map,
        Some(_) => return Err(ValidationError::DataNotObject),
    };

    if let Some(unknown) = data.keys().find(|k| !KNOWN_FIELDS.contains(&k.as_str())) {
        return Err(ValidationError::InvalidField {
            field: "data",
            reason: format!("unknown field '{}'", unknown),
        });
    }

    let events = events_field(data)?;
    let limit = limit_field(data)?;
    let force_refresh = force_refresh_field(data)?;

    Ok(match message_type {
        MessageType::Subscribe => ClientMessage::Subscribe {
            events: events.unwrap_or_default(),
        },
        MessageType::Unsubscribe => ClientMessage::Unsubscribe {
            events: events.unwrap_or_default(),
        },
        MessageType::GetStats => ClientMessage::GetStats {
            force_refresh: force_refresh.unwrap_or(false),
        },
        MessageType::GetTopOperators => ClientMessage::GetTopOperators { limit },
        MessageType::GetTopProducts => ClientMessage::GetTopProducts { limit },
        MessageType::GetGlobalStats => ClientMessage::GetGlobalStats,
    })
}

fn events_field(data: &Map<String, Value>) -> Result<Option<Vec<String>>, ValidationError> {
    let Some(value) = data.get("events") else {
        return Ok(None);
    };
    let invalid = || ValidationError::InvalidField {
        field: "events",
        reason: "must be an array of strings".to_string(),
    };

    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn limit_field(data: &Map<String, Value>) -> Result<Option<usize>, ValidationError> {
    let Some(value) = data.get("limit") else {
        return Ok(None);
    };

    match value.as_u64() {
        Some(limit) if (MIN_LIMIT..=MAX_LIMIT).contains(&limit) => Ok(Some(limit as usize)),
        _ => Err(ValidationError::InvalidField {
            field: "limit",
            reason: format!("must be an integer between {} and {}", MIN_LIMIT, MAX_LIMIT),
        }),
    }
}

fn force_refresh_field(data: &Map<String, Value>) -> Result<Option<bool>, ValidationError> {
    match data.get("force_refresh") {
        None => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        Some(_) => Err(ValidationError::InvalidField {
            field: "force_refresh",
            reason: "must be a boolean".to_string(),
        }),
    }
}
