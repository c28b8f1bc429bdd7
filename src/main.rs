use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use common::config::Configuration;
use exporter::{ExporterOptions, MetricExporter, PrometheusExporter, serve_metrics_http};
use self_metrics::SelfMetricsReader;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

mod self_metrics;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Configuration::load().context("Failed to load configuration")?;

    let exporter = Arc::new(PrometheusExporter::new(ExporterOptions::from(
        &config.exporter,
    )));
    exporter.set_metric_reader(Arc::new(SelfMetricsReader::new(
        &exporter,
        &config.resource,
    )));

    let (init_tx, init_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (stopped_tx, stopped_rx) = oneshot::channel::<()>();

    let server = tokio::spawn({
        let exporter = exporter.clone();
        let http = config.http.clone();
        async move { serve_metrics_http(exporter, &http, init_tx, shutdown_rx, stopped_tx).await }
    });

    let addr = match init_rx.await {
        Ok(addr) => addr,
        Err(_) => {
            // The server exits before signalling init only on a startup failure
            server
                .await
                .context("Metrics http server task failed")?
                .context("Failed to start metrics http server")?;
            return Err(anyhow!("Metrics http server exited during startup"));
        }
    };
    tracing::info!(%addr, "otel-prometheus started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c signal")?;

    tracing::info!("Shutting down");
    exporter.shutdown();
    let _ = shutdown_tx.send(());

    stopped_rx
        .await
        .context("Failed to receive stopped signal from metrics http server")?;
    server
        .await
        .context("Metrics http server task failed")?
        .context("Metrics http server failed")?;

    Ok(())
}
