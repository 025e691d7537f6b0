//! tapkit - offline queue tooling for the TapKit automation platform
//!
//! This crate provides the durable, priority-ordered operation queue that
//! captures user actions (share links, NFC writes, QR codes, automation
//! updates) while a device is offline, and the scaffolding for replaying
//! them once connectivity returns.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod output;
pub mod storage;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use error::TapkitError;
pub use features::queue::{OperationQueue, QueueConfig, QueueStats, QueuedOperation};
pub use features::sync::{OperationHandler, SyncDriver};
