//! Domain event distribution
//!
//! Producers (mutation services, the `/api/events` ingestion route) emit
//! result mutations on the `EventBus`; the update coordinator subscribes.

pub mod bus;
pub mod types;

pub use bus::{
    EmitFailure, ErrorSink, EventBus, EventHandler, HandlerFailure, HandlerId, HandlerResult,
    LoggingErrorSink,
};
pub use types::{DomainEvent, EventKind, EventTopic};
