use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{error, info};

use super::{
    services::{health, import_status, submit_import},
    state::AppState,
};
use crate::catalog::{Catalog, FjallCatalog};
use crate::config::Config;
use crate::exif::ExifTool;
use crate::observability::Metrics;
use crate::processor::{ImageProcessor, ProcessorOptions};
use crate::queue::{FjallQueue, QueueOptions};
use crate::storage::StorageClient;
use crate::worker::WorkerPool;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All HTTP routes with request decompression applied
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/imports", post(submit_import))
        .route("/imports/{batch_id}", get(import_status))
        .route("/health", get(health))
        .with_state(state)
        .layer(RequestDecompressionLayer::new())
}

/// Open the stores, start the worker pool and serve until a shutdown signal.
///
/// Workers are drained after the listener stops accepting requests.
pub async fn run(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address.unwrap_or(config.server.bind_addr);

    let queue_path = config.server.queue_path();
    info!(path = %queue_path.display(), "Opening task queue");
    let queue = Arc::new(
        FjallQueue::open(
            &queue_path,
            QueueOptions {
                lease_timeout: config.queue.lease_timeout(),
                max_deliveries: config.queue.max_deliveries,
            },
        )
        .map_err(|e| format!("Failed to open queue: {e}"))?,
    );

    let catalog_path = config.server.catalog_path();
    info!(path = %catalog_path.display(), "Opening catalog");
    let catalog: Arc<dyn Catalog> = Arc::new(
        FjallCatalog::open(&catalog_path).map_err(|e| format!("Failed to open catalog: {e}"))?,
    );

    info!(provider = ?config.storage.provider, bucket = %config.storage.bucket, "Initializing object store");
    let storage = Arc::new(StorageClient::from_config(&config.storage)?);

    let metrics = Arc::new(Metrics::new());
    let processor = ImageProcessor::builder()
        .storage(storage.clone())
        .catalog(catalog.clone())
        .extractor(Arc::new(ExifTool::new(&config.processor.exiftool_path)))
        .options(ProcessorOptions::from_config(&config))
        .metrics(metrics.clone())
        .build();

    let pool = WorkerPool::spawn(&config.worker, queue.clone(), processor, metrics.clone());

    let state = AppState::new(config, queue.clone(), catalog, storage, metrics.clone());
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "darkroom listening");

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    pool.shutdown().await;
    if let Err(err) = queue.flush() {
        error!(error = %err, "Failed to flush queue");
    }
    info!(metrics = ?metrics.snapshot(), "darkroom stopped");

    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
