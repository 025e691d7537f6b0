//! Offline operation queue engine.
//!
//! The engine owns the in-memory operation map and is the only component
//! that mutates it. Every mutation is written through to durable storage
//! as two JSON blobs (active set, dead-letter set) on a best-effort
//! basis: a storage failure is logged and swallowed, and the in-memory
//! state stays authoritative for the life of the process.
//!
//! Callers never see a storage error from the mutating calls - a user
//! action must not fail because persistence hiccuped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use ulid::Ulid;

use super::backoff::BackoffPolicy;
use super::operation::{OperationStatus, OperationType, Priority, QueuedOperation};
use super::sweeper::SweeperHandle;
use crate::storage::{KvStore, StoreError};

/// Storage key for the active operation set.
pub const ACTIVE_QUEUE_KEY: &str = "tapkit_offline_queue";
/// Storage key for the dead-letter set.
pub const DEAD_LETTER_KEY: &str = "tapkit_dead_letter_queue";

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Base retry delay in milliseconds.
    pub base_delay_ms: u64,
    /// Cap on any single retry delay in milliseconds.
    pub max_delay_ms: u64,
    /// Completed/exhausted entries older than this are swept.
    pub retention_minutes: u64,
    /// Dead-letter entries older than this are swept.
    pub dead_letter_retention_hours: u64,
    /// Interval between periodic cleanup sweeps.
    pub cleanup_interval: std::time::Duration,
    /// Enqueues between opportunistic sweeps.
    pub sweep_after_enqueues: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            retention_minutes: 60,
            dead_letter_retention_hours: 168,
            cleanup_interval: std::time::Duration::from_secs(300),
            sweep_after_enqueues: 25,
        }
    }
}

/// Queue statistics: counts per status plus total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// All operations, active and dead-lettered
    pub total: usize,
    /// Waiting to execute (or waiting out a retry delay)
    pub pending: usize,
    /// Currently executing
    pub processing: usize,
    /// Finished successfully
    pub completed: usize,
    /// Failed with retries remaining
    pub failed: usize,
    /// Parked after exhausting retries
    pub dead_letter: usize,
}

/// Mutable engine state. Guarded by one mutex so that a status change and
/// its persistence trigger are a single critical section.
struct EngineState {
    active: HashMap<String, QueuedOperation>,
    dead_letters: Vec<QueuedOperation>,
    store: Box<dyn KvStore>,
    next_seq: u64,
    enqueues_since_sweep: usize,
}

/// The offline operation queue.
///
/// One authoritative instance per process; clones share state, so the
/// handle can be passed to UI actions, the sync driver, and the cleanup
/// timer. Construct it once at startup and inject it where needed.
#[derive(Clone)]
pub struct OperationQueue {
    state: Arc<Mutex<EngineState>>,
    config: QueueConfig,
    backoff: BackoffPolicy,
    sweeper: Arc<Mutex<Option<SweeperHandle>>>,
}

impl OperationQueue {
    /// Create an engine over the given store, loading any persisted state.
    ///
    /// Startup never fails on bad state: an absent key is an empty queue,
    /// corrupted JSON is discarded, and an oversized blob is cleared from
    /// the store so future writes are not blocked.
    #[must_use]
    pub fn new(store: Box<dyn KvStore>, config: QueueConfig) -> Self {
        let active_ops = Self::load_collection(&*store, ACTIVE_QUEUE_KEY);
        let dead_letters = Self::load_collection(&*store, DEAD_LETTER_KEY);

        let next_seq = active_ops
            .iter()
            .chain(dead_letters.iter())
            .map(|op| op.seq)
            .max()
            .map_or(0, |max| max + 1);

        let active = active_ops
            .into_iter()
            .map(|op| (op.id.clone(), op))
            .collect();

        let backoff = BackoffPolicy::new(config.base_delay_ms, config.max_delay_ms);

        Self {
            state: Arc::new(Mutex::new(EngineState {
                active,
                dead_letters,
                store,
                next_seq,
                enqueues_since_sweep: 0,
            })),
            config,
            backoff,
            sweeper: Arc::new(Mutex::new(None)),
        }
    }

    /// Add an operation to the queue and return its id.
    ///
    /// Always succeeds from the caller's perspective: the operation is
    /// kept in memory even if the durable write fails, so enqueued work
    /// is never silently dropped.
    pub fn enqueue(
        &self,
        operation_type: OperationType,
        payload: serde_json::Value,
        priority: Priority,
        max_retries: u32,
    ) -> String {
        let mut state = self.lock();

        let mut id = Ulid::new().to_string();
        while state.active.contains_key(&id) || state.dead_letters.iter().any(|op| op.id == id) {
            id = Ulid::new().to_string();
        }

        let operation = QueuedOperation {
            id: id.clone(),
            operation_type,
            payload,
            priority,
            status: OperationStatus::Pending,
            retry_count: 0,
            max_retries,
            seq: state.next_seq,
            created_at: Utc::now(),
            next_retry_at: None,
            last_error: None,
        };
        state.next_seq += 1;
        state.active.insert(id.clone(), operation);

        Self::persist_active(&mut state);

        // Large enqueue bursts trigger a sweep so the blob stays bounded
        // even if the periodic timer is not running.
        state.enqueues_since_sweep += 1;
        if state.enqueues_since_sweep >= self.config.sweep_after_enqueues {
            state.enqueues_since_sweep = 0;
            self.sweep_locked(&mut state, Utc::now());
        }

        id
    }

    /// Look up an operation by id, including dead-lettered entries.
    #[must_use]
    pub fn get_operation(&self, id: &str) -> Option<QueuedOperation> {
        let state = self.lock();
        state
            .active
            .get(id)
            .cloned()
            .or_else(|| state.dead_letters.iter().find(|op| op.id == id).cloned())
    }

    /// Current counts per status.
    #[must_use]
    pub fn get_queue_stats(&self) -> QueueStats {
        let state = self.lock();
        let mut stats = QueueStats {
            total: state.active.len() + state.dead_letters.len(),
            dead_letter: state.dead_letters.len(),
            ..QueueStats::default()
        };

        for op in state.active.values() {
            match op.status {
                OperationStatus::Pending => stats.pending += 1,
                OperationStatus::Processing => stats.processing += 1,
                OperationStatus::Completed => stats.completed += 1,
                OperationStatus::Failed => stats.failed += 1,
                // Dead-lettered entries live outside the active map
                OperationStatus::DeadLetter => stats.dead_letter += 1,
            }
        }

        stats
    }

    /// Pending operations whose retry delay (if any) has elapsed, ordered
    /// by priority (high first) and insertion order within a priority.
    ///
    /// A pure read: callers that start work on a returned operation must
    /// mark it processing themselves, which is what keeps a second reader
    /// from picking it up.
    #[must_use]
    pub fn get_ready_operations(&self) -> Vec<QueuedOperation> {
        let now = Utc::now();
        let state = self.lock();

        let mut ready: Vec<QueuedOperation> = state
            .active
            .values()
            .filter(|op| op.status == OperationStatus::Pending && op.is_ready_for_retry(now))
            .cloned()
            .collect();

        ready.sort_by_key(|op| (op.priority.rank(), op.created_at, op.seq));
        ready
    }

    /// Whether an operation is eligible for an attempt right now.
    #[must_use]
    pub fn is_operation_ready_for_retry(&self, operation: &QueuedOperation) -> bool {
        operation.is_ready_for_retry(Utc::now())
    }

    /// Apply a caller-reported status transition and return the updated
    /// operation, or `None` if the id is unknown or dead-lettered.
    ///
    /// A transition to `failed` on an operation whose retry budget is
    /// spent is redirected to the dead-letter set; callers cannot force an
    /// exhausted operation back to `failed`.
    pub fn update_operation_status(
        &self,
        id: &str,
        new_status: OperationStatus,
        error_message: Option<&str>,
    ) -> Option<QueuedOperation> {
        let mut state = self.lock();

        // Guard clause, evaluated before any state assignment: exhausted
        // retries force the dead-letter set regardless of the requested
        // status, keeping retry_count <= max_retries while status stays
        // failed.
        let exhausted = new_status == OperationStatus::Failed
            && state
                .active
                .get(id)
                .is_some_and(|op| op.retry_count >= op.max_retries);

        if exhausted {
            let mut operation = state.active.remove(id)?;
            operation.status = OperationStatus::DeadLetter;
            if let Some(message) = error_message {
                operation.last_error = Some(message.to_string());
            }
            state.dead_letters.push(operation.clone());

            Self::persist_active(&mut state);
            Self::persist_dead_letters(&mut state);
            return Some(operation);
        }

        let operation = state.active.get_mut(id)?;
        operation.status = new_status;
        match new_status {
            // Starting an attempt clears the previous failure reason
            OperationStatus::Processing => operation.last_error = None,
            _ => {
                if let Some(message) = error_message {
                    operation.last_error = Some(message.to_string());
                }
            }
        }
        let updated = operation.clone();

        Self::persist_active(&mut state);
        Some(updated)
    }

    /// Record a failed attempt: bump the retry count, compute the backoff
    /// delay, and stamp `next_retry_at`. Returns the delay, or `None` if
    /// the id is unknown or dead-lettered.
    ///
    /// This call does not transition state; an operation past its budget
    /// is dead-lettered by the next `update_operation_status(.., failed)`.
    pub fn increment_retry_count(&self, id: &str) -> Option<Duration> {
        let mut state = self.lock();

        let operation = state.active.get_mut(id)?;
        operation.retry_count = operation.retry_count.saturating_add(1);
        let delay = self.backoff.delay_for(operation.retry_count);
        operation.next_retry_at = Some(Utc::now() + delay);

        Self::persist_active(&mut state);
        Some(delay)
    }

    /// Reset an active operation so the next sync picks it up again:
    /// pending, zero retries, no recorded error or delay.
    pub fn reset_for_retry(&self, id: &str) -> Option<QueuedOperation> {
        let mut state = self.lock();

        let operation = state.active.get_mut(id)?;
        operation.status = OperationStatus::Pending;
        operation.retry_count = 0;
        operation.next_retry_at = None;
        operation.last_error = None;
        let updated = operation.clone();

        Self::persist_active(&mut state);
        Some(updated)
    }

    /// Move a dead-lettered operation back to the active set with a fresh
    /// retry budget. This is the manual intervention path; dead-letter
    /// entries are otherwise immutable.
    pub fn requeue_dead_letter(&self, id: &str) -> Option<QueuedOperation> {
        let mut state = self.lock();

        let index = state.dead_letters.iter().position(|op| op.id == id)?;
        let mut operation = state.dead_letters.remove(index);
        operation.status = OperationStatus::Pending;
        operation.retry_count = 0;
        operation.next_retry_at = None;
        operation.last_error = None;
        state
            .active
            .insert(operation.id.clone(), operation.clone());

        Self::persist_active(&mut state);
        Self::persist_dead_letters(&mut state);
        Some(operation)
    }

    /// Dead-lettered operations, oldest first.
    #[must_use]
    pub fn get_dead_letters(&self) -> Vec<QueuedOperation> {
        let state = self.lock();
        state.dead_letters.clone()
    }

    /// All active operations with the given status, oldest first.
    #[must_use]
    pub fn get_by_status(&self, status: OperationStatus) -> Vec<QueuedOperation> {
        let state = self.lock();
        let mut operations: Vec<QueuedOperation> = state
            .active
            .values()
            .filter(|op| op.status == status)
            .cloned()
            .collect();
        operations.sort_by_key(|op| op.seq);
        operations
    }

    /// Remove every operation, active and dead-lettered. Intended for
    /// explicit operator resets, not normal operation.
    pub fn clear_all(&self) -> usize {
        let mut state = self.lock();
        let removed = state.active.len() + state.dead_letters.len();
        state.active.clear();
        state.dead_letters.clear();
        Self::persist_active(&mut state);
        Self::persist_dead_letters(&mut state);
        removed
    }

    /// Remove expired completed/exhausted entries. Returns the number of
    /// operations removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Utc::now())
    }

    /// Cleanup as of the provided instant.
    ///
    /// Removes completed operations, and failed operations with no retry
    /// potential, older than the retention window, plus dead-letter
    /// entries past their own (longer) retention. Never touches pending
    /// or processing operations.
    pub fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.lock();
        self.sweep_locked(&mut state, now)
    }

    /// Start the periodic cleanup timer. Starting twice is a no-op.
    pub fn start_cleanup_timer(&self) {
        let mut sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if sweeper.is_none() {
            *sweeper = Some(SweeperHandle::spawn(
                self.clone(),
                self.config.cleanup_interval,
            ));
        }
    }

    /// Stop the periodic cleanup timer and wait for it to exit. Stopping
    /// an idle timer is a no-op.
    pub fn stop_cleanup_timer(&self) {
        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.stop();
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sweep_locked(&self, state: &mut EngineState, now: DateTime<Utc>) -> usize {
        // An unrepresentable retention disables sweeping rather than panicking
        let cutoff = Duration::try_minutes(i64::try_from(self.config.retention_minutes).unwrap_or(i64::MAX))
            .and_then(|retention| now.checked_sub_signed(retention))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let dead_cutoff = Duration::try_hours(
            i64::try_from(self.config.dead_letter_retention_hours).unwrap_or(i64::MAX),
        )
        .and_then(|retention| now.checked_sub_signed(retention))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let active_before = state.active.len();
        state.active.retain(|_, op| {
            let sweepable = match op.status {
                OperationStatus::Completed => true,
                // Failed entries with retries left are awaiting the driver
                OperationStatus::Failed => op.retry_count >= op.max_retries,
                OperationStatus::Pending
                | OperationStatus::Processing
                | OperationStatus::DeadLetter => false,
            };
            !(sweepable && op.created_at < cutoff)
        });
        let removed_active = active_before - state.active.len();

        let dead_before = state.dead_letters.len();
        state.dead_letters.retain(|op| op.created_at >= dead_cutoff);
        let removed_dead = dead_before - state.dead_letters.len();

        if removed_active > 0 {
            Self::persist_active(state);
        }
        if removed_dead > 0 {
            Self::persist_dead_letters(state);
        }

        removed_active + removed_dead
    }

    fn load_collection(store: &dyn KvStore, key: &str) -> Vec<QueuedOperation> {
        match store.get(key) {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(operations) => operations,
                Err(e) => {
                    eprintln!("Warning: discarding corrupted queue state under {key}: {e}");
                    Vec::new()
                },
            },
            Ok(None) => Vec::new(),
            Err(err @ StoreError::ValueTooLarge { .. }) => {
                // Clear the key so future writes are not blocked by a blob
                // we can never read back.
                eprintln!("Warning: {err}; clearing key");
                if let Err(e) = store.remove(key) {
                    eprintln!("Warning: failed to clear {key}: {e}");
                }
                Vec::new()
            },
            Err(e) => {
                eprintln!("Warning: failed to read {key}: {e}");
                Vec::new()
            },
        }
    }

    fn persist_active(state: &mut EngineState) {
        let mut operations: Vec<&QueuedOperation> = state.active.values().collect();
        operations.sort_by_key(|op| op.seq);
        Self::persist(&*state.store, ACTIVE_QUEUE_KEY, &operations);
    }

    fn persist_dead_letters(state: &mut EngineState) {
        let operations: Vec<&QueuedOperation> = state.dead_letters.iter().collect();
        Self::persist(&*state.store, DEAD_LETTER_KEY, &operations);
    }

    fn persist(store: &dyn KvStore, key: &str, operations: &[&QueuedOperation]) {
        match serde_json::to_string(operations) {
            Ok(json) => {
                if let Err(e) = store.set(key, &json) {
                    eprintln!("Warning: failed to persist {key}: {e}");
                }
            },
            Err(e) => {
                eprintln!("Warning: failed to serialize {key}: {e}");
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn test_config() -> QueueConfig {
        QueueConfig::default()
    }

    fn create_test_queue() -> (OperationQueue, MemoryStore) {
        let store = MemoryStore::new();
        let queue = OperationQueue::new(Box::new(store.clone()), test_config());
        (queue, store)
    }

    fn enqueue_share(queue: &OperationQueue, priority: Priority) -> String {
        queue.enqueue(
            OperationType::ShareCreate,
            serde_json::json!({"url": "https://example.com/a"}),
            priority,
            3,
        )
    }

    #[test]
    fn test_enqueue_and_get() {
        let (queue, _store) = create_test_queue();

        let id = enqueue_share(&queue, Priority::Normal);

        let op = queue.get_operation(&id).unwrap();
        assert_eq!(op.id, id);
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retry_count, 0);
        assert_eq!(op.max_retries, 3);
        assert!(op.next_retry_at.is_none());
    }

    #[test]
    fn test_enqueue_persists_active_set() {
        let (queue, store) = create_test_queue();

        let id = enqueue_share(&queue, Priority::Normal);

        let blob = store.get(ACTIVE_QUEUE_KEY).unwrap().unwrap();
        assert!(blob.contains(&id));
    }

    #[test]
    fn test_ready_operations_priority_order() {
        let (queue, _store) = create_test_queue();

        // Enqueue low, high, normal in that order
        let low = enqueue_share(&queue, Priority::Low);
        let high = enqueue_share(&queue, Priority::High);
        let normal = enqueue_share(&queue, Priority::Normal);

        let ready: Vec<String> = queue
            .get_ready_operations()
            .into_iter()
            .map(|op| op.id)
            .collect();

        assert_eq!(ready, vec![high, normal, low]);
    }

    #[test]
    fn test_ready_operations_fifo_within_priority() {
        let (queue, _store) = create_test_queue();

        let first = enqueue_share(&queue, Priority::Normal);
        let second = enqueue_share(&queue, Priority::Normal);
        let third = enqueue_share(&queue, Priority::Normal);

        let ready: Vec<String> = queue
            .get_ready_operations()
            .into_iter()
            .map(|op| op.id)
            .collect();

        assert_eq!(ready, vec![first, second, third]);
    }

    #[test]
    fn test_ready_excludes_non_pending() {
        let (queue, _store) = create_test_queue();

        let processing = enqueue_share(&queue, Priority::Normal);
        let completed = enqueue_share(&queue, Priority::Normal);
        let pending = enqueue_share(&queue, Priority::Normal);

        queue.update_operation_status(&processing, OperationStatus::Processing, None);
        queue.update_operation_status(&completed, OperationStatus::Processing, None);
        queue.update_operation_status(&completed, OperationStatus::Completed, None);

        let ready: Vec<String> = queue
            .get_ready_operations()
            .into_iter()
            .map(|op| op.id)
            .collect();

        assert_eq!(ready, vec![pending]);
    }

    #[test]
    fn test_ready_excludes_backed_off_operations() {
        let (queue, _store) = create_test_queue();

        let delayed = enqueue_share(&queue, Priority::High);
        let fresh = enqueue_share(&queue, Priority::Low);

        // Failure pushes next_retry_at ~1s into the future
        queue.increment_retry_count(&delayed).unwrap();

        let ready: Vec<String> = queue
            .get_ready_operations()
            .into_iter()
            .map(|op| op.id)
            .collect();

        assert_eq!(ready, vec![fresh]);
    }

    #[test]
    fn test_update_status_processing_clears_error() {
        let (queue, _store) = create_test_queue();

        let id = enqueue_share(&queue, Priority::Normal);
        queue.update_operation_status(&id, OperationStatus::Failed, Some("timeout"));

        let op = queue.get_operation(&id).unwrap();
        assert_eq!(op.last_error.as_deref(), Some("timeout"));

        let op = queue
            .update_operation_status(&id, OperationStatus::Processing, None)
            .unwrap();
        assert_eq!(op.status, OperationStatus::Processing);
        assert!(op.last_error.is_none());
    }

    #[test]
    fn test_update_status_unknown_id_is_not_found() {
        let (queue, _store) = create_test_queue();

        assert!(queue
            .update_operation_status("nope", OperationStatus::Completed, None)
            .is_none());
        assert!(queue.increment_retry_count("nope").is_none());
        assert!(queue.get_operation("nope").is_none());
    }

    #[test]
    fn test_increment_retry_count_sets_backoff() {
        let (queue, _store) = create_test_queue();

        let id = enqueue_share(&queue, Priority::Normal);
        let before = Utc::now();
        let delay = queue.increment_retry_count(&id).unwrap();

        // First retry centers on the base delay, jittered by at most 25%
        assert!(delay.num_milliseconds() >= 750);
        assert!(delay.num_milliseconds() <= 1250);

        let op = queue.get_operation(&id).unwrap();
        assert_eq!(op.retry_count, 1);
        let next = op.next_retry_at.unwrap();
        assert!(next >= before + delay);
    }

    #[test]
    fn test_increment_past_budget_still_computes_delay() {
        let (queue, _store) = create_test_queue();

        let id = queue.enqueue(
            OperationType::NfcWrite,
            serde_json::json!({"tag": "A1"}),
            Priority::High,
            1,
        );

        assert!(queue.increment_retry_count(&id).is_some());
        // Past the budget: still increments, the dead-letter transition is
        // driven by the next failed status report
        assert!(queue.increment_retry_count(&id).is_some());

        let op = queue.get_operation(&id).unwrap();
        assert_eq!(op.retry_count, 2);
        assert_eq!(op.status, OperationStatus::Pending);
    }

    #[test]
    fn test_exhausted_failure_dead_letters() {
        let (queue, store) = create_test_queue();

        let id = queue.enqueue(
            OperationType::QrGenerate,
            serde_json::json!({"content": "hello"}),
            Priority::Normal,
            2,
        );

        queue.increment_retry_count(&id).unwrap();
        queue.increment_retry_count(&id).unwrap();

        let op = queue
            .update_operation_status(&id, OperationStatus::Failed, Some("still offline"))
            .unwrap();

        assert_eq!(op.status, OperationStatus::DeadLetter);
        assert_eq!(op.last_error.as_deref(), Some("still offline"));

        // Resident in the dead-letter set, not the active set
        let stats = queue.get_queue_stats();
        assert_eq!(stats.dead_letter, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.total, 1);

        let dead_blob = store.get(DEAD_LETTER_KEY).unwrap().unwrap();
        assert!(dead_blob.contains(&id));
        let active_blob = store.get(ACTIVE_QUEUE_KEY).unwrap().unwrap();
        assert!(!active_blob.contains(&id));
    }

    #[test]
    fn test_failure_below_budget_stays_failed() {
        let (queue, _store) = create_test_queue();

        let id = enqueue_share(&queue, Priority::Normal);
        queue.increment_retry_count(&id).unwrap();

        let op = queue
            .update_operation_status(&id, OperationStatus::Failed, Some("offline"))
            .unwrap();

        assert_eq!(op.status, OperationStatus::Failed);
        assert_eq!(op.retry_count, 1);
    }

    #[test]
    fn test_dead_letter_is_immutable() {
        let (queue, _store) = create_test_queue();

        let id = queue.enqueue(
            OperationType::ShareCreate,
            serde_json::json!({}),
            Priority::Normal,
            0,
        );
        queue.update_operation_status(&id, OperationStatus::Failed, Some("x"));

        assert_eq!(
            queue.get_operation(&id).unwrap().status,
            OperationStatus::DeadLetter
        );

        // Updates and retry accounting treat the entry as gone
        assert!(queue
            .update_operation_status(&id, OperationStatus::Pending, None)
            .is_none());
        assert!(queue.increment_retry_count(&id).is_none());
    }

    #[test]
    fn test_requeue_dead_letter() {
        let (queue, _store) = create_test_queue();

        let id = queue.enqueue(
            OperationType::AutomationUpdate,
            serde_json::json!({"automation_id": "a9"}),
            Priority::Normal,
            0,
        );
        queue.update_operation_status(&id, OperationStatus::Failed, Some("x"));

        let op = queue.requeue_dead_letter(&id).unwrap();
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retry_count, 0);
        assert!(op.last_error.is_none());

        let stats = queue.get_queue_stats();
        assert_eq!(stats.dead_letter, 0);
        assert_eq!(stats.pending, 1);

        assert!(queue.requeue_dead_letter(&id).is_none());
    }

    #[test]
    fn test_reset_for_retry() {
        let (queue, _store) = create_test_queue();

        let id = enqueue_share(&queue, Priority::Normal);
        queue.increment_retry_count(&id).unwrap();
        queue.update_operation_status(&id, OperationStatus::Failed, Some("offline"));

        let op = queue.reset_for_retry(&id).unwrap();
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retry_count, 0);
        assert!(op.next_retry_at.is_none());
        assert!(op.last_error.is_none());
    }

    #[test]
    fn test_stats_counts_statuses() {
        let (queue, _store) = create_test_queue();

        let a = enqueue_share(&queue, Priority::Normal);
        let b = enqueue_share(&queue, Priority::Normal);
        let _c = enqueue_share(&queue, Priority::Normal);

        queue.update_operation_status(&a, OperationStatus::Processing, None);
        queue.update_operation_status(&b, OperationStatus::Processing, None);
        queue.update_operation_status(&b, OperationStatus::Completed, None);

        let stats = queue.get_queue_stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.processing, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.dead_letter, 0);
    }

    #[test]
    fn test_restart_reproduces_state() {
        let store = MemoryStore::new();
        let queue = OperationQueue::new(Box::new(store.clone()), test_config());

        let a = enqueue_share(&queue, Priority::High);
        let b = enqueue_share(&queue, Priority::Normal);
        let _c = enqueue_share(&queue, Priority::Low);
        queue.update_operation_status(&a, OperationStatus::Processing, None);
        queue.update_operation_status(&b, OperationStatus::Processing, None);
        queue.update_operation_status(&b, OperationStatus::Completed, None);
        let before = queue.get_queue_stats();

        // A fresh engine over the same store sees identical counts
        let restarted = OperationQueue::new(Box::new(store.clone()), test_config());
        assert_eq!(restarted.get_queue_stats(), before);

        // And the surviving pending operation is intact
        let reloaded = restarted.get_ready_operations();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].priority, Priority::Low);
    }

    #[test]
    fn test_restart_preserves_fifo_ordering() {
        let store = MemoryStore::new();
        let queue = OperationQueue::new(Box::new(store.clone()), test_config());

        let first = enqueue_share(&queue, Priority::Normal);
        let second = enqueue_share(&queue, Priority::Normal);

        let restarted = OperationQueue::new(Box::new(store.clone()), test_config());
        let third = enqueue_share(&restarted, Priority::Normal);

        let ready: Vec<String> = restarted
            .get_ready_operations()
            .into_iter()
            .map(|op| op.id)
            .collect();

        assert_eq!(ready, vec![first, second, third]);
    }

    #[test]
    fn test_corrupted_state_starts_empty() {
        let store = MemoryStore::new();
        store.set(ACTIVE_QUEUE_KEY, "{not valid json").unwrap();
        store.set(DEAD_LETTER_KEY, "also garbage").unwrap();

        let queue = OperationQueue::new(Box::new(store), test_config());

        let stats = queue.get_queue_stats();
        assert_eq!(stats.total, 0);
    }

    #[test]
    fn test_oversized_state_clears_key_and_starts_empty() {
        struct CappedStore {
            inner: MemoryStore,
            limit: usize,
        }

        impl KvStore for CappedStore {
            fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
                match self.inner.get(key)? {
                    Some(value) if value.len() > self.limit => Err(StoreError::ValueTooLarge {
                        key: key.to_string(),
                        size: value.len(),
                        limit: self.limit,
                    }),
                    other => Ok(other),
                }
            }

            fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
                self.inner.set(key, value)
            }

            fn remove(&self, key: &str) -> Result<(), StoreError> {
                self.inner.remove(key)
            }
        }

        let inner = MemoryStore::new();
        inner.set(ACTIVE_QUEUE_KEY, &"x".repeat(64)).unwrap();

        let queue = OperationQueue::new(
            Box::new(CappedStore {
                inner: inner.clone(),
                limit: 16,
            }),
            test_config(),
        );

        assert_eq!(queue.get_queue_stats().total, 0);
        // The unreadable blob was cleared so future writes go through
        assert_eq!(inner.get(ACTIVE_QUEUE_KEY).unwrap(), None);
    }

    #[test]
    fn test_write_failures_never_reach_the_caller() {
        struct FailingStore;

        impl KvStore for FailingStore {
            fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
                Ok(None)
            }

            fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
                Err(StoreError::Backend("quota exceeded".to_string()))
            }

            fn remove(&self, _key: &str) -> Result<(), StoreError> {
                Ok(())
            }
        }

        let queue = OperationQueue::new(Box::new(FailingStore), test_config());

        // Enqueue and updates succeed; in-memory state stays authoritative
        let id = enqueue_share(&queue, Priority::Normal);
        queue
            .update_operation_status(&id, OperationStatus::Processing, None)
            .unwrap();
        queue
            .update_operation_status(&id, OperationStatus::Completed, None)
            .unwrap();

        assert_eq!(queue.get_queue_stats().completed, 1);
    }

    #[test]
    fn test_cleanup_sweeps_expired_terminal_entries() {
        let (queue, _store) = create_test_queue();

        let done = enqueue_share(&queue, Priority::Normal);
        let pending = enqueue_share(&queue, Priority::Normal);
        queue.update_operation_status(&done, OperationStatus::Processing, None);
        queue.update_operation_status(&done, OperationStatus::Completed, None);

        // Within the retention window nothing is swept
        assert_eq!(queue.cleanup(), 0);

        // Two hours later the completed entry has expired
        let removed = queue.cleanup_at(Utc::now() + Duration::hours(2));
        assert_eq!(removed, 1);

        assert!(queue.get_operation(&done).is_none());
        assert!(queue.get_operation(&pending).is_some());
    }

    #[test]
    fn test_cleanup_keeps_failed_with_retry_potential() {
        let (queue, _store) = create_test_queue();

        let id = enqueue_share(&queue, Priority::Normal);
        queue.increment_retry_count(&id).unwrap();
        queue.update_operation_status(&id, OperationStatus::Failed, Some("offline"));

        // Failed with budget remaining is awaiting a retry, not garbage
        assert_eq!(queue.cleanup_at(Utc::now() + Duration::hours(2)), 0);
        assert!(queue.get_operation(&id).is_some());
    }

    #[test]
    fn test_cleanup_sweeps_dead_letters_after_retention() {
        let (queue, _store) = create_test_queue();

        let id = queue.enqueue(
            OperationType::ShareCreate,
            serde_json::json!({}),
            Priority::Normal,
            0,
        );
        queue.update_operation_status(&id, OperationStatus::Failed, Some("x"));
        assert_eq!(queue.get_queue_stats().dead_letter, 1);

        // Dead letters outlive the active retention window
        assert_eq!(queue.cleanup_at(Utc::now() + Duration::hours(2)), 0);
        assert_eq!(queue.get_queue_stats().dead_letter, 1);

        let removed = queue.cleanup_at(Utc::now() + Duration::days(8));
        assert_eq!(removed, 1);
        assert_eq!(queue.get_queue_stats().dead_letter, 0);
    }

    #[test]
    fn test_enqueue_bursts_trigger_sweep() {
        let store = MemoryStore::new();
        let config = QueueConfig {
            retention_minutes: 0,
            sweep_after_enqueues: 5,
            ..QueueConfig::default()
        };
        let queue = OperationQueue::new(Box::new(store), config);

        let done = enqueue_share(&queue, Priority::Normal);
        queue.update_operation_status(&done, OperationStatus::Processing, None);
        queue.update_operation_status(&done, OperationStatus::Completed, None);

        for _ in 0..5 {
            enqueue_share(&queue, Priority::Normal);
        }

        // The burst crossed the threshold and swept the expired entry
        assert!(queue.get_operation(&done).is_none());
        assert_eq!(queue.get_queue_stats().completed, 0);
    }

    #[test]
    fn test_clear_all() {
        let (queue, store) = create_test_queue();

        let kept = enqueue_share(&queue, Priority::Normal);
        let dead = queue.enqueue(
            OperationType::NfcWrite,
            serde_json::json!({}),
            Priority::High,
            0,
        );
        queue.update_operation_status(&dead, OperationStatus::Failed, Some("x"));

        assert_eq!(queue.clear_all(), 2);
        assert_eq!(queue.get_queue_stats().total, 0);
        assert!(queue.get_operation(&kept).is_none());

        assert_eq!(store.get(ACTIVE_QUEUE_KEY).unwrap().unwrap(), "[]");
        assert_eq!(store.get(DEAD_LETTER_KEY).unwrap().unwrap(), "[]");
    }

    #[test]
    fn test_cleanup_timer_lifecycle() {
        let store = MemoryStore::new();
        let config = QueueConfig {
            cleanup_interval: std::time::Duration::from_millis(10),
            ..QueueConfig::default()
        };
        let queue = OperationQueue::new(Box::new(store), config);

        queue.start_cleanup_timer();
        // Starting again is a no-op
        queue.start_cleanup_timer();

        std::thread::sleep(std::time::Duration::from_millis(40));

        queue.stop_cleanup_timer();
        // Stopping an idle timer is a no-op
        queue.stop_cleanup_timer();
    }
}
