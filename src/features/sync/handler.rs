//! Collaborator seam for executing queued operations.

use crate::error::TapkitError;
use crate::features::queue::QueuedOperation;

#[cfg(test)]
use mockall::automock;

/// Executes the real work behind a queued operation.
///
/// Implementations live with the platform services (share service, NFC
/// writer, QR generator, automation API). The queue guarantees
/// at-least-once delivery, so implementations must apply operations
/// idempotently.
#[cfg_attr(test, automock)]
pub trait OperationHandler {
    /// Execute `operation`.
    ///
    /// # Errors
    ///
    /// Returns an error if the work cannot be completed. The driver
    /// records the error on the operation and schedules a retry (or
    /// dead-letters it once the budget is spent).
    fn execute(&self, operation: &QueuedOperation) -> Result<(), TapkitError>;
}
