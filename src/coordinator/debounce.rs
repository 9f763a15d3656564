/// Trailing-edge debouncer
///
/// Each trigger restarts the window; the action runs once, with the most
/// recent value, after the window passes without a new trigger. An action
/// that has already started is detached from the timer and always runs to
/// completion, even if new triggers arrive meanwhile.
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub type DebouncedAction<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

struct DebounceState {
    pending: Option<JoinHandle<()>>,
    /// Bumped on every trigger; a timer only fires if it still holds the latest
    sequence: u64,
    last_trigger_at: Option<Instant>,
    last_fired_at: Option<Instant>,
}

pub struct Debouncer<T: Send + 'static> {
    window: Duration,
    action: DebouncedAction<T>,
    state: Arc<Mutex<DebounceState>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(window: Duration, action: DebouncedAction<T>) -> Self {
        Self {
            window,
            action,
            state: Arc::new(Mutex::new(DebounceState {
                pending: None,
                sequence: 0,
                last_trigger_at: None,
                last_fired_at: None,
            })),
        }
    }

    /// Restart the window with `value` as the payload of the next firing
    pub fn trigger(&self, value: T) {
        let mut state = self.state.lock();

        if let Some(handle) = state.pending.take() {
            handle.abort();
        }

        state.sequence += 1;
        state.last_trigger_at = Some(Instant::now());

        let sequence = state.sequence;
        let window = self.window;
        let action = self.action.clone();
        let shared = self.state.clone();

        state.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;

            {
                let mut state = shared.lock();
                if state.sequence != sequence {
                    return;
                }
                state.pending = None;
                state.last_fired_at = Some(Instant::now());
            }

            // Detached so that a later abort() cannot cut the action short
            tokio::spawn(action(value));
        }));
    }

    /// Drop the pending firing, if any
    pub fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        state.sequence += 1;
        match state.pending.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    pub fn last_trigger_at(&self) -> Option<Instant> {
        self.state.lock().last_trigger_at
    }

    pub fn last_fired_at(&self) -> Option<Instant> {
        self.state.lock().last_fired_at
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn recording() -> (Arc<Mutex<Vec<u32>>>, DebouncedAction<u32>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        let action: DebouncedAction<u32> = Arc::new(move |value| {
            let sink = sink.clone();
            async move {
                sink.lock().push(value);
            }
            .boxed()
        });
        (fired, action)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_last_value() {
        let (fired, action) = recording();
        let debouncer = Debouncer::new(Duration::from_millis(1000), action);

        debouncer.trigger(1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.trigger(2);
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.trigger(3);
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(fired.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*fired.lock(), vec![3]);
        assert!(!debouncer.is_pending());
        assert!(debouncer.last_fired_at().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_windows_fire_separately() {
        let (fired, action) = recording();
        let debouncer = Debouncer::new(Duration::from_millis(100), action);

        debouncer.trigger(1);
        tokio::time::sleep(Duration::from_millis(150)).await;
        debouncer.trigger(2);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(*fired.lock(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending() {
        let (fired, action) = recording();
        let debouncer = Debouncer::new(Duration::from_millis(100), action);

        debouncer.trigger(1);
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(fired.lock().is_empty());
    }
}
