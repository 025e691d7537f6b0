//! Sync driver scaffolding for the offline queue.
//!
//! The driver replays queued operations once connectivity returns. The
//! concrete services that perform the work (share links, NFC, QR,
//! automations) sit behind [`OperationHandler`]; this module only knows
//! how to drain the queue and report outcomes through the engine.

pub mod driver;
pub mod handler;

pub use driver::{format_sync_report, AttemptResult, DriverConfig, SyncDriver, SyncReport};
pub use handler::OperationHandler;
