/// In-process publish/subscribe bus for domain events
///
/// Handlers are async closures registered per topic. `emit` runs every
/// handler of the topic concurrently and returns once all of them have
/// settled. A failing or panicking handler never affects the others and
/// never reaches the producer; failures are reported once per emit to the
/// configured `ErrorSink`.
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::types::{DomainEvent, EventTopic};
use crate::logger::{self, LogTag};

// ============================================================================
// HANDLER TYPES
// ============================================================================

/// Outcome of a single handler invocation
pub type HandlerResult = Result<(), String>;

/// Type-erased async handler
pub type EventHandler =
    Arc<dyn Fn(DomainEvent) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Identifies a registration so it can be removed with `off`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Registration {
    id: HandlerId,
    once: bool,
    handler: EventHandler,
}

// ============================================================================
// FAILURE REPORTING
// ============================================================================

/// One failed handler within an emit
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    pub handler: HandlerId,
    pub reason: String,
}

/// Aggregated failure report for a single emit
#[derive(Debug, Clone)]
pub struct EmitFailure {
    pub topic: EventTopic,
    pub total: usize,
    pub failures: Vec<HandlerFailure>,
}

impl EmitFailure {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Receives aggregated handler failures
pub trait ErrorSink: Send + Sync {
    fn report(&self, failure: &EmitFailure);
}

/// Default sink: log and continue
pub struct LoggingErrorSink;

impl ErrorSink for LoggingErrorSink {
    fn report(&self, failure: &EmitFailure) {
        let reasons = failure
            .failures
            .iter()
            .map(|f| format!("#{}: {}", f.handler.0, f.reason))
            .collect::<Vec<_>>()
            .join("; ");
        logger::error(
            LogTag::Events,
            &format!(
                "{} of {} handler(s) failed for '{}': {}",
                failure.failed(),
                failure.total,
                failure.topic,
                reasons
            ),
        );
    }
}

// ============================================================================
// EVENT BUS
// ============================================================================

pub struct EventBus {
    handlers: Mutex<HashMap<EventTopic, Vec<Registration>>>,
    next_id: AtomicU64,
    error_sink: RwLock<Arc<dyn ErrorSink>>,
}

impl EventBus {
    /// Create a bus with the logging error sink
    pub fn new() -> Arc<Self> {
        Self::with_error_sink(Arc::new(LoggingErrorSink))
    }

    pub fn with_error_sink(sink: Arc<dyn ErrorSink>) -> Arc<Self> {
        Arc::new(Self {
            handlers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            error_sink: RwLock::new(sink),
        })
    }

    /// Replace the error sink
    pub fn set_error_sink(&self, sink: Arc<dyn ErrorSink>) {
        *self.error_sink.write() = sink;
    }

    /// Register a persistent handler
    pub fn on<F, Fut>(&self, topic: EventTopic, handler: F) -> HandlerId
    where
        F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(topic, false, handler)
    }

    /// Register a handler that is removed before its first invocation
    pub fn once<F, Fut>(&self, topic: EventTopic, handler: F) -> HandlerId
    where
        F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(topic, true, handler)
    }

    fn register<F, Fut>(&self, topic: EventTopic, once: bool, handler: F) -> HandlerId
    where
        F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let handler: EventHandler = Arc::new(move |event| handler(event).boxed());

        self.handlers
            .lock()
            .entry(topic)
            .or_default()
            .push(Registration { id, once, handler });

        logger::debug(
            LogTag::Events,
            &format!("Handler #{} registered on '{}' (once={})", id.0, topic, once),
        );
        id
    }

    /// Remove one handler, or every handler of the topic when `id` is None
    ///
    /// Returns the number of handlers removed.
    pub fn off(&self, topic: EventTopic, id: Option<HandlerId>) -> usize {
        let mut handlers = self.handlers.lock();
        let removed = match id {
            Some(id) => match handlers.get_mut(&topic) {
                Some(list) => {
                    let before = list.len();
                    list.retain(|r| r.id != id);
                    before - list.len()
                }
                None => 0,
            },
            None => handlers.remove(&topic).map(|list| list.len()).unwrap_or(0),
        };

        if handlers.get(&topic).is_some_and(|list| list.is_empty()) {
            handlers.remove(&topic);
        }
        removed
    }

    /// Publish an event to every handler of the topic
    ///
    /// Returns the number of handlers invoked once all have settled.
    pub async fn emit(&self, topic: EventTopic, event: DomainEvent) -> usize {
        // One-shot registrations are dropped before anything runs
        let invocations: Vec<(HandlerId, EventHandler)> = {
            let mut handlers = self.handlers.lock();
            match handlers.get_mut(&topic) {
                Some(list) => {
                    let snapshot = list
                        .iter()
                        .map(|r| (r.id, Arc::clone(&r.handler)))
                        .collect();
                    list.retain(|r| !r.once);
                    if list.is_empty() {
                        handlers.remove(&topic);
                    }
                    snapshot
                }
                None => Vec::new(),
            }
        };

        let total = invocations.len();
        if total == 0 {
            logger::debug(LogTag::Events, &format!("No handlers for '{}'", topic));
            return 0;
        }

        let outcomes = join_all(invocations.into_iter().map(|(id, handler)| {
            let event = event.clone();
            async move {
                let outcome = AssertUnwindSafe(async move { handler(event).await })
                    .catch_unwind()
                    .await;
                (id, outcome)
            }
        }))
        .await;

        let failures: Vec<HandlerFailure> = outcomes
            .into_iter()
            .filter_map(|(id, outcome)| match outcome {
                Ok(Ok(())) => None,
                Ok(Err(reason)) => Some(HandlerFailure { handler: id, reason }),
                Err(panic) => Some(HandlerFailure {
                    handler: id,
                    reason: panic_message(panic.as_ref()),
                }),
            })
            .collect();

        if !failures.is_empty() {
            let report = EmitFailure {
                topic,
                total,
                failures,
            };
            let sink: Arc<dyn ErrorSink> = self.error_sink.read().clone();
            sink.report(&report);
        }

        total
    }

    /// Number of handlers currently registered for a topic
    pub fn handler_count(&self, topic: EventTopic) -> usize {
        self.handlers.lock().get(&topic).map(|l| l.len()).unwrap_or(0)
    }

    /// Remove every handler on every topic
    pub fn clear(&self) {
        self.handlers.lock().clear();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}
