/// Result mutation ingestion
///
/// External record services report mutations here; each accepted request is
/// emitted onto the event bus exactly like an in-process event.
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Response,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    events::{DomainEvent, EventKind},
    logger::{self, LogTag},
    webserver::{
        state::AppState,
        utils::{error_response, success_response},
    },
};

#[derive(Debug, Clone, Deserialize)]
pub struct EventRequest {
    pub action: String,
    pub result_id: String,
    #[serde(default)]
    pub operator_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventAccepted {
    pub topic: &'static str,
    pub handlers: usize,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/events", post(ingest_event))
}

/// Turn a request body into a bus event
pub fn to_domain_event(request: EventRequest) -> Result<DomainEvent, String> {
    let kind = EventKind::from_action(&request.action).ok_or_else(|| {
        format!(
            "unknown action '{}' (expected created, updated or deleted)",
            request.action
        )
    })?;

    if request.result_id.trim().is_empty() {
        return Err("result_id must not be empty".to_string());
    }

    Ok(DomainEvent::new(kind, request.result_id, request.operator_id))
}

/// POST /api/events
async fn ingest_event(
    State(state): State<Arc<AppState>>,
    body: Result<Json<EventRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "INVALID_BODY",
                &rejection.body_text(),
            )
        }
    };

    let event = match to_domain_event(request) {
        Ok(event) => event,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, "INVALID_EVENT", &message),
    };

    let topic = event.topic();
    logger::debug(
        LogTag::Webserver,
        &format!("Ingested {} for result {}", topic.code(), event.result_id),
    );

    let handlers = state.app.bus.emit(topic, event).await;
    success_response(EventAccepted {
        topic: topic.code(),
        handlers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(action: &str, result_id: &str) -> EventRequest {
        EventRequest {
            action: action.to_string(),
            result_id: result_id.to_string(),
            operator_id: "op-1".to_string(),
        }
    }

    #[test]
    fn test_to_domain_event() {
        let event = to_domain_event(request("updated", "r-9")).unwrap();
        assert_eq!(event.kind, EventKind::Updated);
        assert_eq!(event.result_id, "r-9");
        assert_eq!(event.topic().code(), "result.updated");

        assert!(to_domain_event(request("archived", "r-9")).is_err());
        assert!(to_domain_event(request("created", "  ")).is_err());
    }

    #[test]
    fn test_operator_id_optional() {
        let parsed: EventRequest =
            serde_json::from_str(r#"{"action":"deleted","result_id":"r-1"}"#).unwrap();
        assert_eq!(parsed.operator_id, "");
        assert!(to_domain_event(parsed).is_ok());
    }
}
