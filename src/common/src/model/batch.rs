use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::common::v1::{InstrumentationScope, KeyValue};
use opentelemetry_proto::tonic::metrics::v1::{Metric, ResourceMetrics};

/// Identity of one resource instance within a batch.
///
/// Two resources with identical attributes are still distinct if they arrived
/// as separate `ResourceMetrics` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(pub usize);

/// Identity of one (resource, scope) pair within a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeKey {
    pub resource: usize,
    pub scope: usize,
}

/// An ordered batch of metrics as produced by one collection cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricBatch {
    resource_metrics: Vec<ResourceMetrics>,
}

impl MetricBatch {
    pub fn new(resource_metrics: Vec<ResourceMetrics>) -> Self {
        Self { resource_metrics }
    }

    pub fn resource_metrics(&self) -> &[ResourceMetrics] {
        &self.resource_metrics
    }

    /// Total number of metrics across all resources and scopes
    pub fn len(&self) -> usize {
        self.resource_metrics
            .iter()
            .flat_map(|rm| &rm.scope_metrics)
            .map(|sm| sm.metrics.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate metrics in arrival order together with their resource and scope
    pub fn iter(&self) -> impl Iterator<Item = MetricRef<'_>> {
        self.resource_metrics
            .iter()
            .enumerate()
            .flat_map(|(resource_index, rm)| {
                rm.scope_metrics
                    .iter()
                    .enumerate()
                    .flat_map(move |(scope_index, sm)| {
                        sm.metrics.iter().map(move |metric| MetricRef {
                            resource_key: ResourceKey(resource_index),
                            scope_key: ScopeKey {
                                resource: resource_index,
                                scope: scope_index,
                            },
                            resource_attributes: rm
                                .resource
                                .as_ref()
                                .map(|r| r.attributes.as_slice())
                                .unwrap_or_default(),
                            scope: sm.scope.as_ref(),
                            scope_schema_url: &sm.schema_url,
                            metric,
                        })
                    })
            })
    }
}

impl From<Vec<ResourceMetrics>> for MetricBatch {
    fn from(resource_metrics: Vec<ResourceMetrics>) -> Self {
        Self::new(resource_metrics)
    }
}

impl From<ExportMetricsServiceRequest> for MetricBatch {
    fn from(request: ExportMetricsServiceRequest) -> Self {
        Self::new(request.resource_metrics)
    }
}

/// A metric borrowed from a [`MetricBatch`] with its owning resource and scope
#[derive(Debug, Clone, Copy)]
pub struct MetricRef<'a> {
    pub resource_key: ResourceKey,
    pub scope_key: ScopeKey,
    pub resource_attributes: &'a [KeyValue],
    pub scope: Option<&'a InstrumentationScope>,
    pub scope_schema_url: &'a str,
    pub metric: &'a Metric,
}
