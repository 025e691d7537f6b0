//! Queue command implementation.
//!
//! Handles offline queue management commands.

use colored::Colorize;

use crate::cli::args::{OutputFormat, QueueCommands};
use crate::config::{Config, Paths};
use crate::error::TapkitError;
use crate::features::queue::{
    OperationQueue, OperationStatus, OperationType, Priority, QueuedOperation,
};
use crate::output::{format_operation_pretty, format_operations_pretty, format_stats_pretty, to_json};
use crate::storage::SqliteStore;

/// Execute queue subcommands.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or arguments are invalid.
pub fn queue(
    config: &Config,
    cmd: QueueCommands,
    format: OutputFormat,
) -> Result<String, TapkitError> {
    let paths = Paths::new()?;
    paths.ensure_dirs()?;
    let store = SqliteStore::open_at(&paths.database, config.queue.max_value_bytes)?;
    let engine = OperationQueue::new(Box::new(store), config.queue.to_queue_config());

    match cmd {
        QueueCommands::Status => show_status(&engine, format),
        QueueCommands::List { status, limit } => list_operations(&engine, status, limit, format),
        QueueCommands::Ready => list_ready(&engine, format),
        QueueCommands::Show { id } => show_operation(&engine, &id, format),
        QueueCommands::Add {
            operation,
            payload,
            priority,
            max_retries,
        } => add_operation(
            config, &engine, &operation, payload, priority, max_retries, format,
        ),
        QueueCommands::Retry { all, id } => retry_operations(&engine, all, id, format),
        QueueCommands::RequeueDead { id } => requeue_dead(&engine, &id, format),
        QueueCommands::Dead { limit } => list_dead(&engine, limit, format),
        QueueCommands::Clear { all, force } => clear_operations(&engine, all, force, format),
    }
}

/// Show queue status.
fn show_status(engine: &OperationQueue, format: OutputFormat) -> Result<String, TapkitError> {
    let stats = engine.get_queue_stats();

    match format {
        OutputFormat::Json => to_json(&stats),
        OutputFormat::Pretty => Ok(format_stats_pretty(&stats)),
    }
}

/// List queued operations by status.
fn list_operations(
    engine: &OperationQueue,
    status_filter: Option<String>,
    limit: usize,
    format: OutputFormat,
) -> Result<String, TapkitError> {
    let status = match status_filter.as_deref() {
        Some(s) => OperationStatus::parse(s)
            .ok_or_else(|| TapkitError::Config(format!("Unknown status: {s}")))?,
        None => OperationStatus::Pending,
    };

    let operations: Vec<QueuedOperation> = if status == OperationStatus::DeadLetter {
        engine.get_dead_letters()
    } else {
        engine.get_by_status(status)
    };
    let operations: Vec<QueuedOperation> = operations.into_iter().take(limit).collect();

    match format {
        OutputFormat::Json => to_json(&operations),
        OutputFormat::Pretty => {
            let title = format!("{} operations", status.to_string().to_uppercase());
            Ok(format_operations_pretty(&operations, &title))
        },
    }
}

/// List ready operations in drain order.
fn list_ready(engine: &OperationQueue, format: OutputFormat) -> Result<String, TapkitError> {
    let ready = engine.get_ready_operations();

    match format {
        OutputFormat::Json => to_json(&ready),
        OutputFormat::Pretty => {
            if ready.is_empty() {
                return Ok("No operations are ready to sync.".to_string());
            }
            Ok(format_operations_pretty(&ready, "Ready operations"))
        },
    }
}

/// Show a single operation.
fn show_operation(
    engine: &OperationQueue,
    id: &str,
    format: OutputFormat,
) -> Result<String, TapkitError> {
    let operation = engine
        .get_operation(id)
        .ok_or_else(|| TapkitError::NotFound(format!("Operation {id}")))?;

    match format {
        OutputFormat::Json => to_json(&operation),
        OutputFormat::Pretty => Ok(format_operation_pretty(&operation)),
    }
}

/// Add an operation to the queue.
fn add_operation(
    config: &Config,
    engine: &OperationQueue,
    operation_type: &str,
    payload: Option<String>,
    priority: Option<String>,
    max_retries: Option<u32>,
    format: OutputFormat,
) -> Result<String, TapkitError> {
    let operation_type = OperationType::parse(operation_type).ok_or_else(|| {
        TapkitError::Config(format!(
            "Unknown operation type: {operation_type} \
             (expected share-create, nfc-write, qr-generate, or automation-update)"
        ))
    })?;

    let payload: serde_json::Value = match payload {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| TapkitError::Config(format!("Invalid payload JSON: {e}")))?,
        None => serde_json::json!({}),
    };

    let priority = match priority {
        Some(p) => Priority::parse(&p)
            .ok_or_else(|| TapkitError::Config(format!("Unknown priority: {p}")))?,
        None => operation_type.default_priority(),
    };

    let max_retries = max_retries.unwrap_or(config.queue.default_max_retries);

    let id = engine.enqueue(operation_type, payload, priority, max_retries);

    match format {
        OutputFormat::Json => {
            let operation = engine.get_operation(&id);
            to_json(&operation)
        },
        OutputFormat::Pretty => Ok(format!(
            "Queued {} operation (ID: {})",
            operation_type.display_name(),
            id
        )),
    }
}

/// Reset failed operations for retry.
fn retry_operations(
    engine: &OperationQueue,
    all: bool,
    id: Option<String>,
    format: OutputFormat,
) -> Result<String, TapkitError> {
    if let Some(op_id) = id {
        let operation = engine
            .reset_for_retry(&op_id)
            .ok_or_else(|| TapkitError::NotFound(format!("Operation {op_id}")))?;

        match format {
            OutputFormat::Json => to_json(&operation),
            OutputFormat::Pretty => Ok(format!("Reset operation {op_id} for retry")),
        }
    } else if all {
        let failed = engine.get_by_status(OperationStatus::Failed);
        let count = failed.len();

        for operation in failed {
            engine.reset_for_retry(&operation.id);
        }

        match format {
            OutputFormat::Json => {
                let data = serde_json::json!({"reset": count});
                to_json(&data)
            },
            OutputFormat::Pretty => Ok(format!("Reset {count} failed operations for retry")),
        }
    } else {
        Err(TapkitError::Config(
            "Specify --all or provide an operation ID".to_string(),
        ))
    }
}

/// Requeue a dead-lettered operation.
fn requeue_dead(
    engine: &OperationQueue,
    id: &str,
    format: OutputFormat,
) -> Result<String, TapkitError> {
    let operation = engine
        .requeue_dead_letter(id)
        .ok_or_else(|| TapkitError::NotFound(format!("Dead-lettered operation {id}")))?;

    match format {
        OutputFormat::Json => to_json(&operation),
        OutputFormat::Pretty => Ok(format!(
            "Requeued {} operation {} with a fresh retry budget",
            operation.operation_type.display_name(),
            id
        )),
    }
}

/// List dead-lettered operations.
fn list_dead(
    engine: &OperationQueue,
    limit: usize,
    format: OutputFormat,
) -> Result<String, TapkitError> {
    let dead: Vec<QueuedOperation> = engine.get_dead_letters().into_iter().take(limit).collect();

    match format {
        OutputFormat::Json => to_json(&dead),
        OutputFormat::Pretty => {
            if dead.is_empty() {
                return Ok("Dead-letter queue is empty.".to_string());
            }

            let mut text = format_operations_pretty(&dead, "Dead-lettered operations");
            text.push('\n');
            text.push_str(
                &"Run 'tapkit queue requeue-dead <id>' to retry one"
                    .dimmed()
                    .to_string(),
            );
            Ok(text)
        },
    }
}

/// Clear operations from the queue.
fn clear_operations(
    engine: &OperationQueue,
    all: bool,
    force: bool,
    format: OutputFormat,
) -> Result<String, TapkitError> {
    if all {
        if !force {
            return Err(TapkitError::Config(
                "Use --force to clear all operations".to_string(),
            ));
        }
        let removed = engine.clear_all();

        match format {
            OutputFormat::Json => {
                let data = serde_json::json!({"cleared": removed});
                to_json(&data)
            },
            OutputFormat::Pretty => Ok(format!("Cleared all {removed} operations from queue")),
        }
    } else {
        let removed = engine.cleanup();

        match format {
            OutputFormat::Json => {
                let data = serde_json::json!({"cleared": removed});
                to_json(&data)
            },
            OutputFormat::Pretty => Ok(format!("Cleared {removed} expired operations")),
        }
    }
}
