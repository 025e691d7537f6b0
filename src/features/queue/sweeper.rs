//! Background cleanup timer for the queue engine.
//!
//! A dedicated thread wakes on a fixed interval and runs the retention
//! sweep. The thread parks on a channel so that stopping is immediate
//! rather than waiting out the interval.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use super::engine::OperationQueue;

/// Handle to the running sweeper thread.
pub(super) struct SweeperHandle {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Spawn the sweeper over a shared queue handle.
    pub(super) fn spawn(queue: OperationQueue, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();

        let thread = std::thread::Builder::new()
            .name("tapkit-queue-sweeper".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        queue.cleanup();
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                eprintln!("Warning: failed to start cleanup timer: {e}");
                None
            },
        };

        Self { stop_tx, thread }
    }

    /// Signal the thread to exit and wait for it.
    pub(super) fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
