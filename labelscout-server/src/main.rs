//! LabelScout Server - REST API for barcode product scoring
//!
//! Exposes labelscout-core via HTTP endpoints:
//! - POST /score - Run the scoring pipeline for a barcode
//! - GET /products/{upc} - Read a stored score
//! - GET /health, GET /ready - Health probes

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use labelscout_core::{
    live_collaborators, MemoryProductStore, Pipeline, PipelineConfig, ProductStore, ServiceConfig,
    MAX_VARIANTS,
};
use labelscout_server::{create_router, AppState, Config, PostgresProductStore};
use tracing_subscriber::EnvFilter;

/// How often idle rate-limit buckets are dropped.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("labelscout_core=info,labelscout_server=info,tower_http=info")
        }))
        .with_target(false)
        .init();

    let config = Config::from_env();
    let pipeline_config = PipelineConfig::from_env();
    let services = ServiceConfig::from_env();

    tracing::info!(?config, "Loaded server configuration");
    tracing::info!(
        window_secs = pipeline_config.rate_limit_window.as_secs(),
        max_requests = pipeline_config.rate_limit_max_requests,
        extract_timeout_secs = pipeline_config.extract_timeout.as_secs(),
        call_timeout_secs = pipeline_config.call_timeout.as_secs(),
        "Loaded pipeline configuration"
    );

    services
        .require_credentials()
        .context("upstream credentials are required to serve /score")?;

    let worst_case = pipeline_config.worst_case_duration(MAX_VARIANTS);
    if !config.covers(worst_case) {
        tracing::warn!(
            request_timeout_secs = config.timeout_secs,
            worst_case_secs = worst_case.as_secs(),
            "REQUEST_TIMEOUT_SECS is below the pipeline worst case; slow runs will finish detached"
        );
    }

    let store: Arc<dyn ProductStore> = match &config.database_url {
        Some(url) => Arc::new(
            PostgresProductStore::connect(url, config.database_max_connections)
                .await
                .context("failed to connect to product store")?,
        ),
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory product store (data is lost on restart)");
            Arc::new(MemoryProductStore::new())
        }
    };

    let collaborators = live_collaborators(&services, &pipeline_config, store)
        .context("failed to build upstream clients")?;
    let pipeline = Arc::new(Pipeline::new(&pipeline_config, collaborators));

    let limiter = pipeline.limiter().clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            let pruned = limiter.prune(Instant::now());
            if pruned > 0 {
                tracing::debug!(
                    pruned,
                    tracked = limiter.tracked_clients(),
                    "Pruned idle rate-limit buckets"
                );
            }
        }
    });

    let app = create_router(AppState::new(pipeline), &config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("LabelScout server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
