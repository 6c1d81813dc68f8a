use clap::Parser;

/// Configuration for the transfer server.
#[derive(Parser, Debug, Clone)]
#[command(name = "transfer-server")]
#[command(about = "Orchestrates file transfers between the design-data store and Google Drive")]
pub struct Config {
    /// TCP host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    pub host: String,

    /// TCP port to bind to
    #[arg(long, default_value = "8080", env = "PORT")]
    pub port: u16,

    /// Google Drive metadata API base URL
    #[arg(long, default_value = "https://www.googleapis.com", env = "GOOGLE_API_URL")]
    pub google_api_url: String,

    /// Google Drive upload API base URL
    #[arg(long, default_value = "https://www.googleapis.com", env = "GOOGLE_UPLOAD_URL")]
    pub google_upload_url: String,

    /// Design-data (Forge) API base URL
    #[arg(long, default_value = "https://developer.api.autodesk.com", env = "FORGE_API_URL")]
    pub forge_api_url: String,

    /// Remote job runner endpoint. When unset, jobs run in-process.
    #[arg(long, env = "JOB_RUNNER_URL")]
    pub job_runner_url: Option<String>,

    /// API key sent to the remote job runner and expected back on status
    /// updates. Required with `--job-runner-url`.
    #[arg(long, env = "JOB_RUNNER_API_KEY")]
    pub job_runner_api_key: Option<String>,

    /// Maximum queued jobs for the in-process runner
    #[arg(long, default_value = "1000", env = "JOB_QUEUE_SIZE")]
    pub job_queue_size: usize,

    /// Concurrent transfers for the in-process runner
    #[arg(long, default_value = "4", env = "JOB_WORKERS")]
    pub job_workers: usize,

    /// How long finished tasks remain queryable (seconds)
    #[arg(long, default_value = "3600", env = "TASK_RETENTION_SECS")]
    pub task_retention_secs: u64,

    /// Refuse imports whose file name already exists in the target folder
    #[arg(long, default_value = "false", env = "SKIP_EXISTING")]
    pub skip_existing: bool,

    /// Cloudflare Account ID (for D1 API access)
    #[arg(long, env = "CLOUDFLARE_ACCOUNT_ID")]
    pub cloudflare_account_id: String,

    /// Cloudflare API Token (for D1 API access)
    #[arg(long, env = "CLOUDFLARE_API_TOKEN")]
    pub cloudflare_api_token: String,

    /// D1 Database ID (stores transfer_session_token table)
    #[arg(long, env = "D1_DATABASE_ID")]
    pub d1_database_id: String,
}

impl Config {
    /// Key expected from the remote runner, or an error when a remote runner
    /// is configured without one.
    pub fn runner_key(&self) -> anyhow::Result<Option<String>> {
        match (&self.job_runner_url, &self.job_runner_api_key) {
            (None, _) => Ok(None),
            (Some(_), Some(key)) if !key.is_empty() => Ok(Some(key.clone())),
            (Some(_), _) => {
                anyhow::bail!("JOB_RUNNER_API_KEY is required when JOB_RUNNER_URL is set")
            }
        }
    }
}
