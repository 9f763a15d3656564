//! Realtime statistics protocol
//!
//! Transport-agnostic core of the websocket service:
//! - `message`: inbound/outbound schema and topics
//! - `validator`: inbound frame validation
//! - `transport`: `ClientTransport` seam and the channel-backed transport
//! - `registry`: connection ownership, delivery, sweeps and keepalive
//! - `protocol`: connect / message / disconnect handling
//! - `metrics`: registry counters

pub mod message;
pub mod metrics;
pub mod protocol;
pub mod registry;
pub mod transport;
pub mod validator;

pub use message::{ClientMessage, ResponseType, ServerResponse, SnapshotKind, Topic};
pub use metrics::{HubMetrics, HubMetricsSnapshot};
pub use protocol::ProtocolHandler;
pub use registry::{ClientId, ClientInfo, ConnectionRegistry, KeepaliveOutcome};
pub use transport::{ChannelTransport, ClientTransport, TransportReceiver, TransportState};
