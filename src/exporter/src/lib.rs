//! HTTP scrape endpoint rendering OTLP metric batches for Prometheus

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::{Router, routing::get};
use common::config::HttpConfig;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;

mod error;
mod exporter;
pub mod negotiation;
pub mod pipe;

pub use error::ExporterError;
pub use exporter::{
    ExporterOptions, MetricExporter, MetricReader, PrometheusExporter, SCRAPE_TIMEOUT_HEADER,
    ScrapeStats,
};

pub fn metrics_router(exporter: Arc<PrometheusExporter>, path: &str) -> Router {
    Router::new()
        .route(path, get(scrape))
        .layer(TraceLayer::new_for_http())
        .with_state(exporter)
}

async fn scrape(
    State(exporter): State<Arc<PrometheusExporter>>,
    headers: HeaderMap,
) -> Response {
    exporter.handle_scrape(&headers).await
}

/// Serve the scrape endpoint until `shutdown_rx` fires or the exporter shuts down.
///
/// `init_tx` receives the bound address once the listener is ready.
pub async fn serve_metrics_http(
    exporter: Arc<PrometheusExporter>,
    config: &HttpConfig,
    init_tx: oneshot::Sender<SocketAddr>,
    shutdown_rx: oneshot::Receiver<()>,
    stopped_tx: oneshot::Sender<()>,
) -> Result<(), ExporterError> {
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .map_err(|_| ExporterError::InvalidAddress(config.listen_addr.clone()))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ExporterError::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;
    tracing::info!("Serving metrics on http://{}{}", local_addr, config.path);

    let closed = exporter.closed();
    let app = metrics_router(exporter, &config.path);

    init_tx
        .send(local_addr)
        .map_err(|_| ExporterError::Signal("init"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown_rx => {}
                _ = closed => {}
            }
            tracing::info!("Shutting down metrics http server");
        })
        .await?;

    stopped_tx
        .send(())
        .map_err(|_| ExporterError::Signal("stopped"))?;

    Ok(())
}
