//! Storage transfer server.
//!
//! This server:
//! - Resolves or creates Drive folders
//! - Exports design-data versions to Drive and imports Drive files back
//! - Hands the byte copy to a job runner (remote endpoint or in-process pool)
//! - Reports task status to callers and accepts updates from remote runners

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use transfer_core::{
    CredentialAccessor, InternalStore, JobRunner, TaskRegistry, TransferDispatcher,
    TransferPipeline,
};
use transfer_forge::{ForgeClient, ImportPolicy};
use transfer_gdrive::GDriveClient;
use transfer_runner::{HttpJobRunner, LocalJobRunner, LocalRunnerConfig};
use transfer_server::config::Config;
use transfer_server::d1::D1CredentialStore;
use transfer_server::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let runner_key = config.runner_key()?;

    info!("Starting transfer-server v{}", env!("CARGO_PKG_VERSION"));
    info!("  Host: {}", config.host);
    info!("  Port: {}", config.port);
    info!("  Drive API: {}", config.google_api_url);
    info!("  Forge API: {}", config.forge_api_url);
    info!("  Skip existing: {}", config.skip_existing);

    let external = Arc::new(GDriveClient::with_base_urls(
        &config.google_api_url,
        &config.google_upload_url,
    ));
    let internal: Arc<dyn InternalStore> = Arc::new(ForgeClient::with_base_url(
        &config.forge_api_url,
        ImportPolicy {
            skip_existing: config.skip_existing,
        },
    ));

    let retention = Duration::from_secs(config.task_retention_secs);
    info!("  Task retention: {}s", config.task_retention_secs);
    let tasks = Arc::new(TaskRegistry::with_retention(retention));
    spawn_task_sweeper(tasks.clone(), retention);

    let runner: Arc<dyn JobRunner> = match &config.job_runner_url {
        Some(url) => {
            info!("  Job runner: remote ({})", url);
            Arc::new(HttpJobRunner::new(
                url.clone(),
                config.job_runner_api_key.clone(),
            ))
        }
        None => {
            info!(
                "  Job runner: in-process ({} workers, queue {})",
                config.job_workers, config.job_queue_size
            );
            Arc::new(LocalJobRunner::new(
                LocalRunnerConfig {
                    queue_size: config.job_queue_size,
                    max_concurrent: config.job_workers,
                },
                tasks.clone(),
                Some(internal.clone()),
            ))
        }
    };

    info!("  Credentials: D1 ({})", config.d1_database_id);
    let credentials: Arc<dyn CredentialAccessor> = Arc::new(D1CredentialStore::new(
        config.cloudflare_account_id.clone(),
        config.cloudflare_api_token.clone(),
        config.d1_database_id.clone(),
    ));

    let dispatcher = TransferDispatcher::new(runner, tasks);
    let pipeline = TransferPipeline::new(external, internal, dispatcher);

    let state = AppState {
        pipeline: Arc::new(pipeline),
        credentials,
        runner_key,
    };

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors);

    // Bind and serve
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Periodically drop finished tasks past their retention.
fn spawn_task_sweeper(tasks: Arc<TaskRegistry>, retention: Duration) {
    let period = retention.clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            tasks.purge_expired();
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, initiating shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM, initiating shutdown");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
