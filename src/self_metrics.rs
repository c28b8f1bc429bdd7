//! Metrics about the exporter process itself, collected on every scrape.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use async_trait::async_trait;
use common::MetricBatch;
use common::config::ResourceConfig;
use common::model::attributes::string_attribute;
use exporter::{MetricExporter, MetricReader, PrometheusExporter, ScrapeStats};
use opentelemetry_proto::tonic::common::v1::InstrumentationScope;
use opentelemetry_proto::tonic::metrics::v1::{
    AggregationTemporality, Gauge, Metric, NumberDataPoint, ResourceMetrics, ScopeMetrics, Sum,
    metric, number_data_point,
};
use opentelemetry_proto::tonic::resource::v1::Resource;

const SCOPE_NAME: &str = "otel-prometheus";

pub struct SelfMetricsReader {
    exporter: Weak<PrometheusExporter>,
    resource: Resource,
    started: Instant,
    start_time_unix_nano: u64,
}

fn now_unix_nano() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}

fn resource(config: &ResourceConfig) -> Resource {
    let mut attributes = vec![string_attribute("service.name", &config.service_name)];
    if let Some(namespace) = &config.service_namespace {
        attributes.push(string_attribute("service.namespace", namespace));
    }
    if let Some(instance_id) = &config.service_instance_id {
        attributes.push(string_attribute("service.instance.id", instance_id));
    }
    let extra: BTreeMap<_, _> = config.attributes.iter().collect();
    attributes.extend(
        extra
            .into_iter()
            .map(|(key, value)| string_attribute(key, value)),
    );

    Resource {
        attributes,
        ..Default::default()
    }
}

impl SelfMetricsReader {
    pub fn new(exporter: &Arc<PrometheusExporter>, config: &ResourceConfig) -> Self {
        Self {
            exporter: Arc::downgrade(exporter),
            resource: resource(config),
            started: Instant::now(),
            start_time_unix_nano: now_unix_nano(),
        }
    }

    fn counter(&self, name: &str, description: &str, value: u64, now: u64) -> Metric {
        Metric {
            name: name.to_string(),
            description: description.to_string(),
            unit: "{scrape}".to_string(),
            data: Some(metric::Data::Sum(Sum {
                data_points: vec![NumberDataPoint {
                    start_time_unix_nano: self.start_time_unix_nano,
                    time_unix_nano: now,
                    value: Some(number_data_point::Value::AsInt(
                        i64::try_from(value).unwrap_or(i64::MAX),
                    )),
                    ..Default::default()
                }],
                aggregation_temporality: AggregationTemporality::Cumulative as i32,
                is_monotonic: true,
            })),
            ..Default::default()
        }
    }

    fn batch(&self, stats: ScrapeStats) -> MetricBatch {
        let now = now_unix_nano();
        let uptime = Metric {
            name: "process.uptime".to_string(),
            description: "Time since the exporter started".to_string(),
            unit: "s".to_string(),
            data: Some(metric::Data::Gauge(Gauge {
                data_points: vec![NumberDataPoint {
                    time_unix_nano: now,
                    value: Some(number_data_point::Value::AsDouble(
                        self.started.elapsed().as_secs_f64(),
                    )),
                    ..Default::default()
                }],
            })),
            ..Default::default()
        };

        MetricBatch::new(vec![ResourceMetrics {
            resource: Some(self.resource.clone()),
            scope_metrics: vec![ScopeMetrics {
                scope: Some(InstrumentationScope {
                    name: SCOPE_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    ..Default::default()
                }),
                metrics: vec![
                    uptime,
                    self.counter(
                        "prometheus.exporter.scrapes",
                        "Scrapes answered by the exporter",
                        stats.served,
                        now,
                    ),
                    self.counter(
                        "prometheus.exporter.scrapes.rejected",
                        "Scrapes refused because the exporter was closed or collection timed out",
                        stats.rejected,
                        now,
                    ),
                ],
                ..Default::default()
            }],
            ..Default::default()
        }])
    }
}

#[async_trait]
impl MetricReader for SelfMetricsReader {
    async fn collect(&self) -> anyhow::Result<()> {
        let exporter = self
            .exporter
            .upgrade()
            .context("Prometheus exporter has been dropped")?;
        exporter.export(self.batch(exporter.stats()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::http::HeaderMap;
    use exporter::ExporterOptions;

    use super::*;

    fn config() -> ResourceConfig {
        ResourceConfig {
            service_name: "checkout".into(),
            service_namespace: Some("shop".into()),
            service_instance_id: None,
            attributes: HashMap::from([
                ("deployment.environment".to_string(), "test".to_string()),
                ("host.name".to_string(), "box".to_string()),
            ]),
        }
    }

    #[test]
    fn test_resource_attributes() {
        let keys: Vec<_> = resource(&config())
            .attributes
            .into_iter()
            .map(|attribute| attribute.key)
            .collect();
        assert_eq!(
            keys,
            vec![
                "service.name",
                "service.namespace",
                "deployment.environment",
                "host.name"
            ]
        );
    }

    #[test]
    fn test_batch_carries_scrape_stats() {
        let exporter = Arc::new(PrometheusExporter::new(ExporterOptions::default()));
        let reader = SelfMetricsReader::new(&exporter, &config());
        let batch = reader.batch(ScrapeStats {
            served: 4,
            rejected: 1,
        });

        let metrics: Vec<_> = batch.iter().map(|metric| metric.metric).collect();
        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[0].name, "process.uptime");

        let Some(metric::Data::Sum(served)) = &metrics[1].data else {
            panic!("expected sum");
        };
        assert!(served.is_monotonic);
        assert_eq!(
            served.data_points[0].value,
            Some(number_data_point::Value::AsInt(4))
        );
    }

    #[tokio::test]
    async fn test_scrape_renders_self_metrics() {
        let exporter = Arc::new(PrometheusExporter::new(ExporterOptions::default()));
        exporter.set_metric_reader(Arc::new(SelfMetricsReader::new(&exporter, &config())));

        let response = exporter.handle_scrape(&HeaderMap::new()).await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();

        assert!(body.contains("# TYPE process_uptime_seconds gauge\n"), "{body}");
        assert!(
            body.contains("# TYPE prometheus_exporter_scrapes_total counter\n"),
            "{body}"
        );
        assert!(
            body.contains("prometheus_exporter_scrapes_rejected_total{otel_scope_name=\"otel-prometheus\""),
            "{body}"
        );
    }

    #[tokio::test]
    async fn test_collect_fails_once_exporter_is_gone() {
        let exporter = Arc::new(PrometheusExporter::new(ExporterOptions::default()));
        let reader = SelfMetricsReader::new(&exporter, &config());
        drop(exporter);
        assert!(reader.collect().await.is_err());
    }
}
