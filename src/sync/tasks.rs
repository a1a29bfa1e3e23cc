//! Background task outcome log
//!
//! Fire-and-forget work (backup publishes, claim iterations) still leaves a
//! trace: every outcome lands in a bounded ring buffer that the host can
//! inspect. Success, deferred (relay down, try later) and failed are
//! distinguished because only the last one is worth surfacing.

use std::collections::VecDeque;
use std::sync::Mutex;

use nostr::Timestamp;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Success,
    /// Could not run now (e.g. disconnected); will be retried naturally
    Deferred,
    Failed,
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Stable task name, e.g. "publish_token_event"
    pub task: &'static str,
    pub status: TaskStatus,
    pub detail: Option<String>,
    /// Unix seconds
    pub at: u64,
}

/// Bounded log of the most recent background task outcomes
pub struct TaskLog {
    entries: Mutex<VecDeque<TaskOutcome>>,
    capacity: usize,
}

impl TaskLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, task: &'static str, status: TaskStatus, detail: Option<String>) {
        match status {
            TaskStatus::Success => debug!(task, "background task succeeded"),
            TaskStatus::Deferred => debug!(task, detail = detail.as_deref(), "background task deferred"),
            TaskStatus::Failed => warn!(task, detail = detail.as_deref(), "background task failed"),
        }

        let outcome = TaskOutcome {
            task,
            status,
            detail,
            at: Timestamp::now().as_secs(),
        };

        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(outcome);
    }

    /// Most recent outcomes, oldest first
    pub fn recent(&self) -> Vec<TaskOutcome> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}
