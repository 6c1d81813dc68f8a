use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::credentials::TransferCredentials;
use crate::descriptor::{DescriptorPair, TransferDescriptor};
use crate::error::TransferError;
use crate::provider::CallbackContext;
use crate::task::{TaskRegistry, TransferTask};

/// Job payload handed to a runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferJob {
    pub task_id: String,
    pub source: TransferDescriptor,
    pub destination: TransferDescriptor,
    pub credentials: TransferCredentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackContext>,
}

/// Asynchronous worker performing the byte copy.
///
/// `submit` only has to accept the job; it must not wait for the copy.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn submit(&self, job: TransferJob) -> Result<(), TransferError>;
}

/// Hands descriptor pairs to a runner and tracks them as tasks.
#[derive(Clone)]
pub struct TransferDispatcher {
    runner: Arc<dyn JobRunner>,
    tasks: Arc<TaskRegistry>,
}

impl TransferDispatcher {
    pub fn new(runner: Arc<dyn JobRunner>, tasks: Arc<TaskRegistry>) -> Self {
        Self { runner, tasks }
    }

    pub fn tasks(&self) -> &Arc<TaskRegistry> {
        &self.tasks
    }

    /// Submit one transfer and return its `Received` task.
    #[instrument(skip_all, level = "debug")]
    pub async fn dispatch(
        &self,
        pair: DescriptorPair,
        credentials: &TransferCredentials,
        callback: Option<CallbackContext>,
    ) -> Result<TransferTask, TransferError> {
        let task = TransferTask::received();
        self.tasks.insert(task.clone());

        let job = TransferJob {
            task_id: task.task_id.clone(),
            source: pair.source,
            destination: pair.destination,
            credentials: credentials.clone(),
            callback,
        };

        if let Err(e) = self.runner.submit(job).await {
            self.tasks.remove(&task.task_id);
            error!("Job runner rejected task {}: {}", task.task_id, e);
            return Err(match e {
                TransferError::Dispatch(msg) => TransferError::Dispatch(msg),
                other => TransferError::Dispatch(other.to_string()),
            });
        }

        info!(task_id = %task.task_id, "Transfer task received");
        Ok(task)
    }
}
