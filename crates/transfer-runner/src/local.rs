//! In-process job runner: bounded queue, semaphore-limited worker pool.
//!
//! No retries. A job that fails is marked `Failed` with the error message.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};
use transfer_core::{InternalStore, JobRunner, TaskRegistry, TaskStatus, TransferError, TransferJob};

use crate::copy::copy_between;

#[derive(Debug, Clone)]
pub struct LocalRunnerConfig {
    /// Jobs waiting beyond this are rejected.
    pub queue_size: usize,
    pub max_concurrent: usize,
}

impl Default for LocalRunnerConfig {
    fn default() -> Self {
        Self {
            queue_size: 1000,
            max_concurrent: 4,
        }
    }
}

struct Worker {
    http: Client,
    tasks: Arc<TaskRegistry>,
    internal: Option<Arc<dyn InternalStore>>,
}

pub struct LocalJobRunner {
    tx: mpsc::Sender<TransferJob>,
}

impl LocalJobRunner {
    /// Spawn the worker pool. Must be called from within a tokio runtime.
    ///
    /// `internal` finalizes imports that carry a callback context; without it
    /// such jobs fail after the copy.
    pub fn new(
        config: LocalRunnerConfig,
        tasks: Arc<TaskRegistry>,
        internal: Option<Arc<dyn InternalStore>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));
        let worker = Arc::new(Worker {
            http: Client::new(),
            tasks,
            internal,
        });

        let max_concurrent = config.max_concurrent.max(1);
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        tokio::spawn(async move {
            worker_pool(rx, worker, semaphore).await;
        });

        info!(
            queue_size = config.queue_size,
            max_concurrent = max_concurrent,
            "Local job runner initialized"
        );

        Self { tx }
    }
}

#[async_trait]
impl JobRunner for LocalJobRunner {
    async fn submit(&self, job: TransferJob) -> Result<(), TransferError> {
        self.tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(job) => {
                warn!("Job queue is full, rejecting task {}", job.task_id);
                TransferError::Dispatch("job queue is full".to_string())
            }
            TrySendError::Closed(_) => TransferError::Dispatch("job runner stopped".to_string()),
        })
    }
}

async fn worker_pool(
    mut rx: mpsc::Receiver<TransferJob>,
    worker: Arc<Worker>,
    semaphore: Arc<Semaphore>,
) {
    while let Some(job) = rx.recv().await {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                error!(
                    "Worker pool closed, dropping task {} and stopping",
                    job.task_id
                );
                break;
            }
        };
        let worker = worker.clone();

        tokio::spawn(async move {
            let _permit = permit;
            worker.process(job).await;
        });
    }
}

impl Worker {
    #[instrument(skip(self, job), fields(task_id = %job.task_id))]
    async fn process(&self, job: TransferJob) {
        if let Err(e) = self
            .tasks
            .update_status(&job.task_id, TaskStatus::InProgress, None)
        {
            error!("Cannot start task {}: {}", job.task_id, e);
            return;
        }

        let outcome = self.run(&job).await;

        let update = match &outcome {
            Ok(()) => {
                info!("Transfer task {} succeeded", job.task_id);
                self.tasks
                    .update_status(&job.task_id, TaskStatus::Succeeded, None)
            }
            Err(e) => {
                error!(error = %e, "Transfer task {} failed", job.task_id);
                self.tasks
                    .update_status(&job.task_id, TaskStatus::Failed, Some(e.to_string()))
            }
        };

        if let Err(e) = update {
            warn!("Cannot record outcome of task {}: {}", job.task_id, e);
        }
    }

    async fn run(&self, job: &TransferJob) -> anyhow::Result<()> {
        copy_between(&self.http, &job.source, &job.destination).await?;

        if let Some(callback) = &job.callback {
            let internal = self
                .internal
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("no internal store to register the upload"))?;
            internal
                .register_upload(&job.credentials.internal, callback)
                .await?;
        }

        Ok(())
    }
}
