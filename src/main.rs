//! Encode server binary.
//!
//! Wires up:
//! - Local adapters (in-memory job store, channel queue, filesystem workspaces)
//! - The ffmpeg worker pool
//! - The HTTP API

use anyhow::Context;
use encode_server::adapters::local::{
    http, ChannelQueue, FfmpegExecutor, FsWorkspaces, InMemoryJobStore, TokioScheduler,
};
use encode_server::application::{
    jobs::JobService,
    worker::{WorkerPool, WorkerService},
};
use encode_server::config::ServerConfig;
use encode_server::ports::queue::WorkQueue;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encode_server=info,tower_http=info".into()),
        )
        .with(fmt::layer())
        .init();

    // 1. Adapters
    let workspaces = FsWorkspaces::open(&config.workspace_dir)
        .await
        .with_context(|| format!("cannot prepare workspace dir {:?}", config.workspace_dir))?;
    workspaces
        .sweep_orphans()
        .await
        .context("cannot sweep workspace dir")?;
    info!("Workspaces under {:?}", workspaces.root());

    let store = Arc::new(InMemoryJobStore::new());
    let queue = Arc::new(ChannelQueue::new(config.max_queued_jobs));

    // 2. Application services
    let jobs = Arc::new(JobService::new(
        store.clone(),
        queue.clone(),
        Arc::new(workspaces),
        Arc::new(TokioScheduler),
        config.cleanup_delay(),
    ));

    let worker_service = Arc::new(WorkerService::new(
        store,
        queue.clone(),
        Arc::new(FfmpegExecutor::new()),
        config.transcode_settings(),
    ));

    // 3. Start workers
    let workers = WorkerPool::new(worker_service).start(config.workers.get());
    info!("Started {} transcoding workers", workers.len());

    // 4. HTTP layer
    let app = http::router(jobs, config.upload_form);

    // 5. Start server
    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("cannot bind {}", config.bind_addr()))?;
    info!("Listening at {}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Idle workers return; running ffmpeg children die with the runtime.
    queue.close();
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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
    info!("Received shutdown signal");
}
