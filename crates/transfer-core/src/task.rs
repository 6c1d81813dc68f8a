use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TransferError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Received,
    InProgress,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Received, Self::InProgress)
                | (Self::Received, Self::Failed)
                | (Self::InProgress, Self::Succeeded)
                | (Self::InProgress, Self::Failed)
        )
    }
}

/// Tracked unit of an in-flight or completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTask {
    pub task_id: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferTask {
    /// A fresh task in the `Received` state with a new UUID.
    pub fn received() -> Self {
        let now = Utc::now();
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            status: TaskStatus::Received,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }
}

/// How long a finished task stays visible by default.
pub const DEFAULT_TASK_RETENTION: std::time::Duration = std::time::Duration::from_secs(3600);

/// In-memory task table shared by the dispatcher and the runners.
///
/// Finished tasks are kept for the retention period and then dropped by
/// `purge_expired`; unfinished tasks are never dropped.
#[derive(Debug)]
pub struct TaskRegistry {
    tasks: DashMap<String, TransferTask>,
    retention: Duration,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::with_retention(DEFAULT_TASK_RETENTION)
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: std::time::Duration) -> Self {
        Self {
            tasks: DashMap::new(),
            retention: Duration::from_std(retention).unwrap_or_else(|_| Duration::days(36500)),
        }
    }

    /// Drop finished tasks whose last update is older than the retention
    /// period. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let cutoff = Utc::now() - self.retention;
        let before = self.tasks.len();
        self.tasks
            .retain(|_, task| !(task.status.is_terminal() && task.updated_at <= cutoff));
        let removed = before.saturating_sub(self.tasks.len());
        if removed > 0 {
            debug!("Purged {} finished tasks", removed);
        }
        removed
    }

    pub fn insert(&self, task: TransferTask) {
        self.tasks.insert(task.task_id.clone(), task);
    }

    pub fn get(&self, task_id: &str) -> Option<TransferTask> {
        self.tasks.get(task_id).map(|t| t.clone())
    }

    pub fn remove(&self, task_id: &str) -> Option<TransferTask> {
        self.tasks.remove(task_id).map(|(_, t)| t)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Move a task to `status`, rejecting transitions out of terminal states.
    pub fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<TransferTask, TransferError> {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| TransferError::NotFound(format!("task {}", task_id)))?;

        if !entry.status.can_transition_to(status) {
            return Err(TransferError::Conflict(format!(
                "task {} cannot move from {:?} to {:?}",
                task_id, entry.status, status
            )));
        }

        entry.status = status;
        entry.updated_at = Utc::now();
        if error.is_some() {
            entry.error = error;
        }

        debug!("Task {} is now {:?}", task_id, status);
        Ok(entry.clone())
    }
}
