/// Client transport abstraction
///
/// The registry talks to connections only through `ClientTransport`, so the
/// protocol core does not depend on any particular socket library. The
/// websocket server wires a `ChannelTransport` to each socket: frames pushed
/// here are drained by the socket's writer loop.
use async_trait::async_trait;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

use crate::errors::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    Connecting,
    Open,
    Closed,
}

impl TransportState {
    fn to_u8(self) -> u8 {
        match self {
            TransportState::Connecting => 0,
            TransportState::Open => 1,
            TransportState::Closed => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => TransportState::Connecting,
            1 => TransportState::Open,
            _ => TransportState::Closed,
        }
    }
}

#[async_trait]
pub trait ClientTransport: Send + Sync {
    fn state(&self) -> TransportState;

    /// Deliver one text frame. Never retried by callers.
    async fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Best-effort close; idempotent
    fn close(&self);
}

/// Compare two transport handles by identity
pub fn same_transport(a: &Arc<dyn ClientTransport>, b: &Arc<dyn ClientTransport>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

// ============================================================================
// CHANNEL TRANSPORT
// ============================================================================

/// Transport backed by a bounded queue
///
/// A full queue counts as a failed write: a client that cannot keep up is
/// evicted rather than buffered without limit.
pub struct ChannelTransport {
    tx: mpsc::Sender<String>,
    state: AtomicU8,
    close_signal: Arc<Notify>,
}

/// Writer side of a `ChannelTransport`
pub struct TransportReceiver {
    pub frames: mpsc::Receiver<String>,
    pub close_signal: Arc<Notify>,
}

impl ChannelTransport {
    pub fn new(buffer: usize) -> (Arc<Self>, TransportReceiver) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let close_signal = Arc::new(Notify::new());

        let transport = Arc::new(Self {
            tx,
            state: AtomicU8::new(TransportState::Open.to_u8()),
            close_signal: close_signal.clone(),
        });

        (
            transport,
            TransportReceiver {
                frames: rx,
                close_signal,
            },
        )
    }

    /// Called by the socket loop once the peer is gone
    pub fn mark_closed(&self) {
        self.state
            .store(TransportState::Closed.to_u8(), Ordering::SeqCst);
    }
}

#[async_trait]
impl ClientTransport for ChannelTransport {
    fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::SeqCst))
    }

    async fn send(&self, frame: String) -> Result<(), TransportError> {
        if self.state() != TransportState::Open {
            return Err(TransportError::NotOpen);
        }

        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => {
                self.mark_closed();
                TransportError::SendFailed("writer gone".to_string())
            }
        })
    }

    fn close(&self) {
        let previous = self
            .state
            .swap(TransportState::Closed.to_u8(), Ordering::SeqCst);
        if previous != TransportState::Closed.to_u8() {
            self.close_signal.notify_one();
        }
    }
}

// ============================================================================
// TEST TRANSPORT
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicBool;

    /// Records frames; can be told to fail
    pub struct MockTransport {
        state: Mutex<TransportState>,
        fail_sends: AtomicBool,
        frames: Mutex<Vec<String>>,
        close_calls: Mutex<u32>,
    }

    impl MockTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                state: Mutex::new(TransportState::Open),
                fail_sends: AtomicBool::new(false),
                frames: Mutex::new(Vec::new()),
                close_calls: Mutex::new(0),
            })
        }

        pub fn set_state(&self, state: TransportState) {
            *self.state.lock() = state;
        }

        pub fn fail_sends(&self) {
            self.fail_sends.store(true, Ordering::SeqCst);
        }

        pub fn frames(&self) -> Vec<serde_json::Value> {
            self.frames
                .lock()
                .iter()
                .map(|f| serde_json::from_str(f).unwrap())
                .collect()
        }

        pub fn last_frame(&self) -> Option<serde_json::Value> {
            self.frames().pop()
        }

        pub fn close_calls(&self) -> u32 {
            *self.close_calls.lock()
        }
    }

    #[async_trait]
    impl ClientTransport for MockTransport {
        fn state(&self) -> TransportState {
            *self.state.lock()
        }

        async fn send(&self, frame: String) -> Result<(), TransportError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(TransportError::SendFailed("mock failure".to_string()));
            }
            self.frames.lock().push(frame);
            Ok(())
        }

        fn close(&self) {
            *self.close_calls.lock() += 1;
            *self.state.lock() = TransportState::Closed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_transport_delivers_frames() {
        let (transport, mut receiver) = ChannelTransport::new(4);
        transport.send("hello".to_string()).await.unwrap();
        assert_eq!(receiver.frames.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_channel_transport_full_queue_fails() {
        let (transport, _receiver) = ChannelTransport::new(1);
        transport.send("a".to_string()).await.unwrap();
        assert_eq!(
            transport.send("b".to_string()).await,
            Err(TransportError::QueueFull)
        );
    }

    #[tokio::test]
    async fn test_channel_transport_close() {
        let (transport, receiver) = ChannelTransport::new(4);
        transport.close();
        transport.close();

        assert_eq!(transport.state(), TransportState::Closed);
        assert_eq!(
            transport.send("late".to_string()).await,
            Err(TransportError::NotOpen)
        );
        // The stored permit wakes the writer even though it was not waiting yet
        receiver.close_signal.notified().await;
    }

    #[tokio::test]
    async fn test_dropped_writer_marks_closed() {
        let (transport, receiver) = ChannelTransport::new(4);
        drop(receiver);
        assert!(transport.send("x".to_string()).await.is_err());
        assert_eq!(transport.state(), TransportState::Closed);
    }

    #[test]
    fn test_transport_identity() {
        let (a, _ra) = ChannelTransport::new(1);
        let (b, _rb) = ChannelTransport::new(1);
        let a: Arc<dyn ClientTransport> = a;
        let b: Arc<dyn ClientTransport> = b;
        assert!(same_transport(&a, &a.clone()));
        assert!(!same_transport(&a, &b));
    }
}
