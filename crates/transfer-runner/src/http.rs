use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};
use transfer_core::{JobRunner, TransferError, TransferJob};

const API_KEY_HEADER: &str = "x-api-key";

/// Posts each job as JSON to a remote worker endpoint.
///
/// The worker reports progress back through the task status route.
pub struct HttpJobRunner {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpJobRunner {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl JobRunner for HttpJobRunner {
    #[instrument(skip(self, job), level = "debug", fields(task_id = %job.task_id))]
    async fn submit(&self, job: TransferJob) -> Result<(), TransferError> {
        let mut req = self.http.post(&self.endpoint).json(&job);
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| TransferError::Dispatch(format!("job runner unreachable: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("Job runner refused task {}: {} {}", job.task_id, status, body);
            let reason = match status {
                StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => "queue full",
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "rejected upstream",
                _ => "refused",
            };
            return Err(TransferError::Dispatch(format!(
                "job runner {} ({})",
                reason, status
            )));
        }

        debug!("Job runner accepted task {}", job.task_id);
        Ok(())
    }
}
