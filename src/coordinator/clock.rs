/// Shared record of the most recent real update
///
/// The coordinator marks it, the connection registry reads it to decide
/// whether a periodic keepalive push would be redundant. Keeping it in its
/// own type lets both sides hold it without holding each other.
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Answers whether a keepalive push should be skipped right now
pub trait KeepaliveGate: Send + Sync {
    fn should_skip_keepalive(&self) -> bool;
}

pub struct UpdateClock {
    suppress_window: Duration,
    last_update: Mutex<Option<Instant>>,
}

impl UpdateClock {
    pub fn new(suppress_window: Duration) -> Self {
        Self {
            suppress_window,
            last_update: Mutex::new(None),
        }
    }

    pub fn mark(&self) {
        *self.last_update.lock() = Some(Instant::now());
    }

    pub fn since_last_update(&self) -> Option<Duration> {
        self.last_update.lock().map(|at| at.elapsed())
    }
}

impl KeepaliveGate for UpdateClock {
    fn should_skip_keepalive(&self) -> bool {
        self.since_last_update()
            .map(|elapsed| elapsed < self.suppress_window)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_window() {
        let clock = UpdateClock::new(Duration::from_millis(2000));
        assert!(!clock.should_skip_keepalive());

        clock.mark();
        assert!(clock.should_skip_keepalive());

        tokio::time::advance(Duration::from_millis(1999)).await;
        assert!(clock.should_skip_keepalive());

        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(!clock.should_skip_keepalive());
    }
}
