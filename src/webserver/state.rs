/// Shared application state for the webserver
///
/// Route handlers reach the statistics pipeline through the composed `App`.
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::app::App;
use crate::config::WebserverConfig;

/// Shared application state passed to all route handlers
#[derive(Clone)]
pub struct AppState {
    /// Webserver configuration
    pub config: Arc<WebserverConfig>,

    /// Statistics pipeline
    pub app: Arc<App>,

    /// Server startup time
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(app: Arc<App>) -> Self {
        Self {
            config: Arc::new(app.config.webserver.clone()),
            app,
            startup_time: Utc::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.startup_time).num_seconds().max(0) as u64
    }

    /// Outbound queue size for new socket connections
    pub fn send_buffer(&self) -> usize {
        self.app.config.registry.send_buffer
    }
}
