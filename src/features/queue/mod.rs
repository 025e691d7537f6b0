//! Offline operation queue.
//!
//! User actions issued while the device is offline are captured here and
//! replayed once connectivity returns. The engine guarantees:
//! - durability across restarts (state is written through on every mutation)
//! - priority + FIFO drain ordering
//! - bounded exponential-backoff retries with jitter
//! - dead-lettering of operations that exhaust their retry budget
//! - bounded growth via retention-based cleanup

pub mod backoff;
pub mod engine;
pub mod operation;
mod sweeper;

pub use backoff::BackoffPolicy;
pub use engine::{
    OperationQueue, QueueConfig, QueueStats, ACTIVE_QUEUE_KEY, DEAD_LETTER_KEY,
};
pub use operation::{OperationStatus, OperationType, Priority, QueuedOperation};
