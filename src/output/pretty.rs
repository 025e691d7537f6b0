use chrono::Utc;
use colored::Colorize;

use crate::features::queue::{OperationStatus, QueueStats, QueuedOperation};

/// Format queue statistics as pretty output
#[must_use]
pub fn format_stats_pretty(stats: &QueueStats) -> String {
    let mut lines = Vec::new();

    lines.push("Offline Queue Status".bold().to_string());
    lines.push("─".repeat(40));

    lines.push(format!(
        "  Pending:     {} {}",
        stats.pending,
        if stats.pending > 0 {
            "operations waiting".dimmed()
        } else {
            "".dimmed()
        }
    ));
    lines.push(format!(
        "  Processing:  {} {}",
        stats.processing,
        "operations".dimmed()
    ));
    lines.push(format!(
        "  Completed:   {} {}",
        stats.completed,
        "operations".dimmed()
    ));
    lines.push(format!(
        "  Failed:      {} {}",
        stats.failed,
        if stats.failed > 0 {
            "operations awaiting retry".yellow()
        } else {
            "".normal()
        }
    ));
    lines.push(format!(
        "  Dead letter: {} {}",
        stats.dead_letter,
        if stats.dead_letter > 0 {
            "operations need attention".red()
        } else {
            "".normal()
        }
    ));
    lines.push(format!("  Total:       {}", stats.total));

    if stats.pending > 0 {
        lines.push(String::new());
        lines.push(
            "Run 'tapkit queue ready' to see what a sync pass would drain"
                .dimmed()
                .to_string(),
        );
    }

    lines.join("\n")
}

/// Format a list of operations as a pretty table
#[must_use]
pub fn format_operations_pretty(operations: &[QueuedOperation], title: &str) -> String {
    if operations.is_empty() {
        return format!("{title} (0 items)\n  No items");
    }

    let mut lines = Vec::new();

    lines.push(format!("{} ({})", title, operations.len()));
    lines.push("─".repeat(72));
    lines.push(format!(
        "{:<28} {:<20} {:<8} {:<17} {}",
        "ID", "Type", "Priority", "Created", "Status"
    ));
    lines.push("─".repeat(72));

    for op in operations {
        let created = op.created_at.format("%Y-%m-%d %H:%M").to_string();
        let status_str = status_glyph(op.status);

        lines.push(format!(
            "{:<28} {:<20} {:<8} {:<17} {}",
            op.id,
            op.operation_type.display_name(),
            op.priority.to_string(),
            created,
            status_str
        ));

        if let Some(error) = &op.last_error {
            let short_error = if error.len() > 60 {
                format!("{}...", &error[..57])
            } else {
                error.clone()
            };
            lines.push(format!("       {}", short_error.red()));
        }
    }

    lines.join("\n")
}

/// Format a single operation as pretty output
#[must_use]
pub fn format_operation_pretty(op: &QueuedOperation) -> String {
    let mut output = format!("{} {}\n", status_glyph(op.status), op.id.bold());

    output.push_str(&format!("  {}: {}\n", "Type".dimmed(), op.operation_type));
    output.push_str(&format!("  {}: {}\n", "Priority".dimmed(), op.priority));
    output.push_str(&format!("  {}: {}\n", "Status".dimmed(), op.status));
    output.push_str(&format!(
        "  {}: {}/{}\n",
        "Retries".dimmed(),
        op.retry_count,
        op.max_retries
    ));
    output.push_str(&format!(
        "  {}: {}\n",
        "Created".dimmed(),
        op.created_at.format("%Y-%m-%d %H:%M:%S")
    ));

    if let Some(next) = op.next_retry_at {
        let wait = next.signed_duration_since(Utc::now());
        let when = if wait.num_seconds() > 0 {
            format!("{next} (in {}s)", wait.num_seconds())
        } else {
            format!("{next} (due)")
        };
        output.push_str(&format!("  {}: {when}\n", "Next retry".dimmed()));
    }

    if let Some(error) = &op.last_error {
        output.push_str(&format!("  {}: {}\n", "Last error".dimmed(), error.red()));
    }

    output.push_str(&format!(
        "  {}: {}\n",
        "Payload".dimmed(),
        serde_json::to_string(&op.payload).unwrap_or_else(|_| "<unprintable>".to_string())
    ));

    output
}

fn status_glyph(status: OperationStatus) -> String {
    match status {
        OperationStatus::Pending => "⏳".to_string(),
        OperationStatus::Processing => "▶".to_string(),
        OperationStatus::Completed => "✓".green().to_string(),
        OperationStatus::Failed => "✗".yellow().to_string(),
        OperationStatus::DeadLetter => "☠".red().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::queue::{OperationType, Priority};

    fn make_operation(status: OperationStatus) -> QueuedOperation {
        QueuedOperation {
            id: "01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string(),
            operation_type: OperationType::NfcWrite,
            payload: serde_json::json!({"tag": "A1"}),
            priority: Priority::High,
            status,
            retry_count: 1,
            max_retries: 3,
            seq: 0,
            created_at: Utc::now(),
            next_retry_at: None,
            last_error: Some("tag out of range".to_string()),
        }
    }

    #[test]
    fn test_format_stats_empty() {
        let text = format_stats_pretty(&QueueStats::default());
        assert!(text.contains("Offline Queue Status"));
        assert!(text.contains("Total:       0"));
    }

    #[test]
    fn test_format_operations_empty() {
        let text = format_operations_pretty(&[], "Pending");
        assert!(text.contains("Pending (0 items)"));
        assert!(text.contains("No items"));
    }

    #[test]
    fn test_format_operations_includes_error() {
        let ops = vec![make_operation(OperationStatus::Failed)];
        let text = format_operations_pretty(&ops, "Failed");

        assert!(text.contains("01ARZ3NDEKTSV4RRFFQ69G5FAV"));
        assert!(text.contains("Write NFC Tag"));
        assert!(text.contains("tag out of range"));
    }

    #[test]
    fn test_format_single_operation() {
        let text = format_operation_pretty(&make_operation(OperationStatus::Failed));

        assert!(text.contains("Retries"));
        assert!(text.contains("1/3"));
        assert!(text.contains("tag out of range"));
        assert!(text.contains(r#"{"tag":"A1"}"#));
    }
}
