//! Recomputation and fan-out of statistics after result mutations

pub mod clock;
pub mod coordinator;
pub mod debounce;

pub use clock::{KeepaliveGate, UpdateClock};
pub use coordinator::{CoordinatorStats, StatsUpdate, UpdateCoordinator, UpdateMetadata, UpdateSink};
pub use debounce::{DebouncedAction, Debouncer};
