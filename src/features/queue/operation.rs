//! Operation types for the offline queue.
//!
//! Defines the operations that can be queued, their priorities, and the
//! lifecycle states the engine moves them through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operation types that can be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Create a share link
    ShareCreate,
    /// Write an NFC tag
    NfcWrite,
    /// Generate a QR code
    QrGenerate,
    /// Update an automation
    AutomationUpdate,
}

impl OperationType {
    /// Get the display name for this operation type.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::ShareCreate => "Create Share Link",
            Self::NfcWrite => "Write NFC Tag",
            Self::QrGenerate => "Generate QR Code",
            Self::AutomationUpdate => "Update Automation",
        }
    }

    /// Default priority for this operation type.
    ///
    /// Callers may override at enqueue time; these are the defaults the
    /// CLI and app surfaces use.
    #[must_use]
    pub const fn default_priority(&self) -> Priority {
        match self {
            // Tag writes block a physical interaction, so they go first
            Self::NfcWrite => Priority::High,
            Self::ShareCreate | Self::AutomationUpdate => Priority::Normal,
            Self::QrGenerate => Priority::Low,
        }
    }

    /// Parse a kebab-case type name as used on the command line.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "share-create" | "share_create" => Some(Self::ShareCreate),
            "nfc-write" | "nfc_write" => Some(Self::NfcWrite),
            "qr-generate" | "qr_generate" => Some(Self::QrGenerate),
            "automation-update" | "automation_update" => Some(Self::AutomationUpdate),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Ordering priority of a queued operation.
///
/// Fixed at enqueue time and used only for drain ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Drained before everything else
    High,
    /// Default
    Normal,
    /// Drained last
    Low,
}

impl Priority {
    /// Ordering rank; lower drains first.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }

    /// Parse a priority name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "high" => Some(Self::High),
            "normal" => Some(Self::Normal),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        };
        write!(f, "{s}")
    }
}

/// Status of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Waiting to be executed (or waiting out a retry delay)
    Pending,
    /// Currently being executed
    Processing,
    /// Successfully executed
    Completed,
    /// Last attempt failed; retries may remain
    Failed,
    /// Retry budget exhausted; parked for manual intervention
    DeadLetter,
}

impl OperationStatus {
    /// Check if this status is terminal (no more attempts will be made).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::DeadLetter)
    }

    /// Parse a status name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "dead_letter" | "dead-letter" => Some(Self::DeadLetter),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::DeadLetter => "dead_letter",
        };
        write!(f, "{s}")
    }
}

/// A queued operation with metadata.
///
/// Owned and mutated exclusively by the queue engine. Timestamps are
/// persisted as milliseconds since the epoch to match the blob format the
/// mobile app writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedOperation {
    /// Unique ID, assigned at enqueue time
    pub id: String,
    /// Operation type
    pub operation_type: OperationType,
    /// Payload for the collaborator that executes the operation
    pub payload: serde_json::Value,
    /// Drain priority, fixed at enqueue time
    pub priority: Priority,
    /// Current status
    pub status: OperationStatus,
    /// Number of failed attempts so far
    pub retry_count: u32,
    /// Retry budget, fixed at enqueue time
    pub max_retries: u32,
    /// Insertion sequence; FIFO tie-break within a priority
    pub seq: u64,
    /// When the operation was enqueued
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Earliest instant the next attempt may start; set on failure
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub next_retry_at: Option<DateTime<Utc>>,
    /// Last recorded failure reason
    pub last_error: Option<String>,
}

impl QueuedOperation {
    /// Check whether this operation is eligible for an attempt at `now`.
    ///
    /// True for pending/failed operations whose retry delay (if any) has
    /// elapsed. Pure in `now`, so callers and tests can evaluate it at any
    /// instant.
    #[must_use]
    pub fn is_ready_for_retry(&self, now: DateTime<Utc>) -> bool {
        if !matches!(
            self.status,
            OperationStatus::Pending | OperationStatus::Failed
        ) {
            return false;
        }

        self.next_retry_at.map_or(true, |at| now >= at)
    }
}
