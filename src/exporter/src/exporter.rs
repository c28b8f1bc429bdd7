use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE, VARY};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use common::MetricBatch;
use common::config::{ExporterConfig, TranslationStrategy};
use exposition::byte_stream::{ByteSink, CoalescingBuffer};
use exposition::{PrometheusWriter, ResourceLabelFilter, WriterConfig};
use opentelemetry_proto::tonic::metrics::v1::AggregationTemporality;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::negotiation::{
    ContentEncoding, ContentOffer, negotiate_content, negotiate_encoding, offers_for,
};
use crate::pipe::{self, ResponseEncoder};

/// Scrape deadline sent by Prometheus, in (possibly fractional) seconds
pub const SCRAPE_TIMEOUT_HEADER: HeaderName =
    HeaderName::from_static("x-prometheus-scrape-timeout-seconds");

/// Bytes coalesced before a chunk is handed to the encoder
const WRITE_BUFFER_SIZE: usize = 1024;

/// Chunks in flight between the writer task and the response body
const PIPE_CAPACITY: usize = 4;

/// Produces metric batches on demand.
///
/// A reader answers `collect` by pushing the collected batch into
/// [`MetricExporter::export`] before the returned future completes. Dropping
/// the future cancels the collection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricReader: Send + Sync {
    async fn collect(&self) -> anyhow::Result<()>;
}

/// Push side of the exporter, driven by a [`MetricReader`]
pub trait MetricExporter: Send + Sync {
    fn export(&self, batch: MetricBatch) -> bool;
    fn shutdown(&self) -> bool;
    fn force_flush(&self) -> bool;
    fn temporality(&self) -> AggregationTemporality;
}

/// Settings shared by every scrape
#[derive(Clone, Default)]
pub struct ExporterOptions {
    pub writer: WriterConfig,
    pub resource_labels: Option<ResourceLabelFilter>,
    pub compression: bool,
    pub translation_strategy: TranslationStrategy,
}

impl From<&ExporterConfig> for ExporterOptions {
    fn from(config: &ExporterConfig) -> Self {
        let resource_labels = (!config.resource_constant_labels.is_empty()).then(|| {
            let allowed = config.resource_constant_labels.clone();
            Arc::new(move |key: &str| allowed.iter().any(|allowed| allowed == key))
                as ResourceLabelFilter
        });

        Self {
            writer: WriterConfig {
                without_units: config.without_units,
                without_type_suffix: config.without_type_suffix,
                without_scope_info: config.without_scope_info,
                without_target_info: config.without_target_info,
                ..Default::default()
            },
            resource_labels,
            compression: config.compression,
            translation_strategy: config.translation_strategy,
        }
    }
}

/// Counters of answered and refused scrapes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    pub served: u64,
    pub rejected: u64,
}

#[derive(Default)]
struct ScrapeState {
    batch: Arc<MetricBatch>,
    pending: usize,
}

/// Serves the most recent collection to Prometheus scrapers.
///
/// Every scrape triggers a collection on the registered reader and renders
/// whatever batch the reader exported in response. Batches are only retained
/// while at least one scrape is in flight.
pub struct PrometheusExporter {
    writer_config: WriterConfig,
    resource_labels: Option<ResourceLabelFilter>,
    compression: bool,
    offers: Vec<ContentOffer>,
    reader: OnceLock<Arc<dyn MetricReader>>,
    state: Mutex<ScrapeState>,
    closed: watch::Sender<bool>,
    served: AtomicU64,
    rejected: AtomicU64,
}

impl PrometheusExporter {
    pub fn new(options: ExporterOptions) -> Self {
        let strategy = options.translation_strategy;
        let mut writer_config = WriterConfig {
            without_job_info: true,
            without_timestamps: true,
            ..options.writer
        };
        if !strategy.adds_suffixes() {
            writer_config.without_units = true;
            writer_config.without_type_suffix = true;
        }

        Self {
            writer_config,
            resource_labels: options.resource_labels,
            compression: options.compression,
            offers: offers_for(strategy),
            reader: OnceLock::new(),
            state: Mutex::new(ScrapeState::default()),
            closed: watch::Sender::new(false),
            served: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Register the reader collections are requested from; only the first
    /// registration takes effect.
    pub fn set_metric_reader(&self, reader: Arc<dyn MetricReader>) -> bool {
        self.reader.set(reader).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the exporter has been shut down
    pub fn closed(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut closed = self.closed.subscribe();
        async move {
            let _ = closed.wait_for(|closed| *closed).await;
        }
    }

    pub fn stats(&self) -> ScrapeStats {
        ScrapeStats {
            served: self.served.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    /// Number of scrapes currently waiting for or rendering a collection
    pub fn pending(&self) -> usize {
        self.lock_state().pending
    }

    fn lock_state(&self) -> MutexGuard<'_, ScrapeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reject(&self) -> Response {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }

    /// Answer one scrape request
    pub async fn handle_scrape(&self, headers: &HeaderMap) -> Response {
        if self.is_closed() {
            debug!("Rejecting scrape, exporter is closed");
            return self.reject();
        }

        let offer = negotiate_content(header_str(headers, &ACCEPT), &self.offers);
        let encoding = negotiate_encoding(header_str(headers, &ACCEPT_ENCODING), self.compression);
        let timeout = scrape_timeout(headers);

        let Some(batch) = self.collect(timeout).await else {
            return self.reject();
        };
        self.served.fetch_add(1, Ordering::Relaxed);
        trace!(
            content_type = offer.content_type,
            encoding = encoding.as_str(),
            metrics = batch.len(),
            "Serving scrape"
        );

        let body = stream_document(self.writer_for(&offer), batch, encoding);
        let mut response = Response::new(body);
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(offer.content_type));
        headers.insert(VARY, HeaderValue::from_static("Accept, Accept-Encoding"));
        if encoding != ContentEncoding::Identity {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding.as_str()));
        }
        response
    }

    /// Trigger a collection and snapshot the cached batch, `None` on timeout
    async fn collect(&self, timeout: Option<Duration>) -> Option<Arc<MetricBatch>> {
        let _pending = PendingScrape::enter(self);

        match self.reader.get() {
            Some(reader) => {
                let collection = reader.collect();
                let result = match timeout {
                    Some(timeout) => match tokio::time::timeout(timeout, collection).await {
                        Ok(result) => result,
                        Err(_) => {
                            debug!(?timeout, "Collection exceeded scrape timeout");
                            return None;
                        }
                    },
                    None => collection.await,
                };
                if let Err(err) = result {
                    warn!(error = %err, "Metric collection failed, serving cached batch");
                }
            }
            None => debug!("No metric reader registered"),
        }

        let batch = self.lock_state().batch.clone();
        Some(batch)
    }

    fn writer_for(&self, offer: &ContentOffer) -> PrometheusWriter {
        let writer = PrometheusWriter::new(self.writer_config)
            .with_escaping(offer.escaping_scheme())
            .with_format(offer.format());
        match &self.resource_labels {
            Some(filter) => writer.with_resource_constant_labels(filter.clone()),
            None => writer,
        }
    }
}

impl MetricExporter for PrometheusExporter {
    fn export(&self, batch: MetricBatch) -> bool {
        let mut state = self.lock_state();
        if state.pending > 0 {
            state.batch = Arc::new(batch);
        } else {
            trace!("Discarding batch exported without a pending scrape");
        }
        true
    }

    fn shutdown(&self) -> bool {
        let was_closed = self.closed.send_replace(true);
        if !was_closed {
            debug!("Prometheus exporter shut down");
        }
        !was_closed
    }

    fn force_flush(&self) -> bool {
        !self.is_closed()
    }

    fn temporality(&self) -> AggregationTemporality {
        AggregationTemporality::Cumulative
    }
}

/// Holds one slot of the pending counter; the last scrape out clears the cache
struct PendingScrape<'e> {
    exporter: &'e PrometheusExporter,
}

impl<'e> PendingScrape<'e> {
    fn enter(exporter: &'e PrometheusExporter) -> Self {
        exporter.lock_state().pending += 1;
        Self { exporter }
    }
}

impl Drop for PendingScrape<'_> {
    fn drop(&mut self) {
        let mut state = self.exporter.lock_state();
        state.pending -= 1;
        if state.pending == 0 {
            state.batch = Arc::default();
        }
    }
}

fn header_str<'h>(headers: &'h HeaderMap, name: &HeaderName) -> Option<&'h str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn scrape_timeout(headers: &HeaderMap) -> Option<Duration> {
    let seconds: f64 = header_str(headers, &SCRAPE_TIMEOUT_HEADER)?.trim().parse().ok()?;
    if seconds <= 0.0 {
        return None;
    }
    // Values beyond what a Duration can hold leave the collection unbounded
    Duration::try_from_secs_f64(seconds).ok()
}

/// Render `batch` on a blocking thread and stream it as the response body
fn stream_document(
    writer: PrometheusWriter,
    batch: Arc<MetricBatch>,
    encoding: ContentEncoding,
) -> Body {
    let (sink, stream) = pipe::channel(PIPE_CAPACITY);
    tokio::task::spawn_blocking(move || {
        let mut sink = CoalescingBuffer::new(ResponseEncoder::new(sink, encoding), WRITE_BUFFER_SIZE);
        match writer.write(&mut sink, &batch).and_then(|()| sink.end()) {
            Ok(()) => trace!("Scrape response written"),
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                debug!("Scrape client went away, aborting response")
            }
            Err(err) => warn!(error = %err, "Failed to write scrape response"),
        }
    });
    Body::from_stream(stream)
}
