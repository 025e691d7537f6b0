//! Sync driver for replaying queued operations.
//!
//! Drains ready operations through the engine's public contract: claim as
//! processing, attempt via the handler, then report completed or failed.
//! When and how often the driver runs is up to the embedder (timer,
//! connectivity signal, manual trigger); the engine makes no assumptions.

use colored::Colorize;

use super::handler::OperationHandler;
use crate::features::queue::{OperationQueue, OperationStatus, OperationType, QueuedOperation};

/// Configuration for a sync pass.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum number of operations attempted per pass.
    pub limit: usize,
    /// Whether to stop the pass on the first failed attempt.
    pub stop_on_error: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            stop_on_error: false,
        }
    }
}

/// Result of attempting a single operation.
#[derive(Debug)]
pub struct AttemptResult {
    /// Operation ID
    pub id: String,
    /// Operation type
    pub operation_type: OperationType,
    /// Whether the attempt succeeded
    pub success: bool,
    /// Error message if it failed
    pub error: Option<String>,
    /// Whether the failure exhausted the retry budget
    pub dead_lettered: bool,
    /// Whether the operation vanished before it could be claimed
    pub skipped: bool,
}

/// Result of a sync pass over multiple operations.
#[derive(Debug)]
pub struct SyncReport {
    /// Number of successful attempts
    pub succeeded: usize,
    /// Number of failed attempts
    pub failed: usize,
    /// Number of failures that ended in the dead-letter set
    pub dead_lettered: usize,
    /// Number of skipped operations
    pub skipped: usize,
    /// Individual results
    pub results: Vec<AttemptResult>,
}

impl SyncReport {
    /// Create an empty report.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            succeeded: 0,
            failed: 0,
            dead_lettered: 0,
            skipped: 0,
            results: Vec::new(),
        }
    }

    /// Add a result.
    pub fn add(&mut self, result: AttemptResult) {
        if result.skipped {
            self.skipped += 1;
        } else if result.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
            if result.dead_lettered {
                self.dead_lettered += 1;
            }
        }
        self.results.push(result);
    }

    /// Check if all attempted operations succeeded.
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Get total operations processed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

/// Driver that replays ready operations through a handler.
pub struct SyncDriver<'a> {
    queue: &'a OperationQueue,
    handler: &'a dyn OperationHandler,
    config: DriverConfig,
}

impl<'a> SyncDriver<'a> {
    /// Create a driver with default configuration.
    #[must_use]
    pub fn new(queue: &'a OperationQueue, handler: &'a dyn OperationHandler) -> Self {
        Self {
            queue,
            handler,
            config: DriverConfig::default(),
        }
    }

    /// Create a driver with custom configuration.
    #[must_use]
    pub const fn with_config(
        queue: &'a OperationQueue,
        handler: &'a dyn OperationHandler,
        config: DriverConfig,
    ) -> Self {
        Self {
            queue,
            handler,
            config,
        }
    }

    /// Attempt every ready operation, in drain order.
    pub fn run(&self) -> SyncReport {
        let ready = self.queue.get_ready_operations();
        let mut report = SyncReport::empty();

        for operation in ready.into_iter().take(self.config.limit) {
            let result = self.attempt_one(&operation);
            let should_stop = !result.success && !result.skipped && self.config.stop_on_error;
            report.add(result);

            if should_stop {
                break;
            }
        }

        report
    }

    /// Attempt a single ready operation.
    fn attempt_one(&self, operation: &QueuedOperation) -> AttemptResult {
        let id = operation.id.as_str();

        // Claim it first so a concurrent pass cannot pick it up too
        if self
            .queue
            .update_operation_status(id, OperationStatus::Processing, None)
            .is_none()
        {
            // Swept or requeued between the read and the claim
            return AttemptResult {
                id: id.to_string(),
                operation_type: operation.operation_type,
                success: false,
                error: None,
                dead_lettered: false,
                skipped: true,
            };
        }

        match self.handler.execute(operation) {
            Ok(()) => {
                self.queue
                    .update_operation_status(id, OperationStatus::Completed, None);
                AttemptResult {
                    id: id.to_string(),
                    operation_type: operation.operation_type,
                    success: true,
                    error: None,
                    dead_lettered: false,
                    skipped: false,
                }
            },
            Err(e) => {
                let message = e.to_string();

                // Record the failure, then let the engine decide between
                // another retry and the dead-letter set
                self.queue.increment_retry_count(id);
                let updated =
                    self.queue
                        .update_operation_status(id, OperationStatus::Failed, Some(&message));
                let dead_lettered = updated
                    .as_ref()
                    .is_some_and(|op| op.status == OperationStatus::DeadLetter);

                if !dead_lettered {
                    // Retry accepted: back to pending, next_retry_at holds
                    // the earliest re-attempt
                    self.queue
                        .update_operation_status(id, OperationStatus::Pending, None);
                }

                AttemptResult {
                    id: id.to_string(),
                    operation_type: operation.operation_type,
                    success: false,
                    error: Some(message),
                    dead_lettered,
                    skipped: false,
                }
            },
        }
    }
}

/// Format a sync report for display.
#[must_use]
pub fn format_sync_report(report: &SyncReport) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Sync completed: {} operations", report.total()));
    lines.push("─".repeat(40));

    if report.succeeded > 0 {
        lines.push(format!(
            "  {} {}",
            "✓".green(),
            format!("{} succeeded", report.succeeded).green()
        ));
    }

    if report.failed > 0 {
        lines.push(format!(
            "  {} {}",
            "✗".red(),
            format!("{} failed", report.failed).red()
        ));
    }

    if report.dead_lettered > 0 {
        lines.push(format!(
            "  {} {}",
            "☠".red(),
            format!("{} dead-lettered", report.dead_lettered).red()
        ));
    }

    if report.skipped > 0 {
        lines.push(format!(
            "  {} {}",
            "○".yellow(),
            format!("{} skipped", report.skipped).yellow()
        ));
    }

    // Show first few errors
    let errors: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.error.is_some())
        .take(3)
        .collect();

    if !errors.is_empty() {
        lines.push(String::new());
        lines.push("Errors:".to_string());
        for result in errors {
            lines.push(format!(
                "  - {}: {}",
                result.operation_type,
                result.error.as_deref().unwrap_or("Unknown error")
            ));
        }
    }

    lines.join("\n")
}
