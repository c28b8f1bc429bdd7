//! Prometheus / OpenMetrics document writer
//!
//! A document is written in two passes over the batch. The first pass resolves
//! every metric's final name, groups metrics into families, drops conflicting
//! metrics and precomputes constant labels per resource and per scope. When the
//! format supports it, `target_info` series are streamed out during this pass.
//! The second pass writes the families sorted by name, followed by `# EOF`.

use std::borrow::Cow;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use std::sync::Arc;

use common::model::attributes::find_string;
use common::{MetricBatch, MetricRef, ResourceKey, ScopeKey};
use opentelemetry_proto::tonic::common::v1::KeyValue;
use opentelemetry_proto::tonic::metrics::v1::{
    AggregationTemporality, Exemplar, HistogramDataPoint, Metric, NumberDataPoint, metric::Data,
    number_data_point,
};
use tracing::{error, trace, warn};

use crate::byte_stream::{ByteSink, LengthSink};
use crate::escaping::{EscapingScheme, is_legacy_label_name, is_legacy_metric_name};
use crate::family::{Label, LabelValue, MetricFamily, MetricLabels, PrometheusType, label_order};
use crate::format::{ExpositionFormat, exemplar_value};
use crate::text::{Number, write_number, write_quoted, write_string};
use crate::units::{CachedUnitResolver, DefaultUnitResolver, UnitResolver};
use crate::value::write_attribute_value;

/// Exemplar labels longer than this are written without their attributes
pub const EXEMPLAR_LABELS_MAX_LENGTH: u64 = 128;

/// `service.name` used for the `job` label when the resource has none
pub const DEFAULT_SERVICE_NAME: &str = "unknown_service";

/// Selects which resource attributes become constant labels on every series
pub type ResourceLabelFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Output toggles, all off by default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterConfig {
    /// No unit suffix on names and no `# UNIT` lines
    pub without_units: bool,
    /// No `_total` suffix on counter family names
    pub without_type_suffix: bool,
    /// No `otel_scope_*` labels
    pub without_scope_info: bool,
    /// No `target_info` series
    pub without_target_info: bool,
    /// No `job` / `instance` labels
    pub without_job_info: bool,
    /// No sample timestamps
    pub without_timestamps: bool,
}

#[derive(Clone)]
pub struct PrometheusWriter {
    config: WriterConfig,
    escaping: EscapingScheme,
    format: ExpositionFormat,
    unit_resolver: Arc<dyn UnitResolver + Send + Sync>,
    resource_labels: Option<ResourceLabelFilter>,
}

impl Default for PrometheusWriter {
    fn default() -> Self {
        Self::new(WriterConfig::default())
    }
}

/// One line of a family
struct Sample<'a> {
    suffix: &'static str,
    value: Number,
    timestamp: u64,
    attributes: &'a [KeyValue],
    le: Option<f64>,
    exemplar: Option<&'a Exemplar>,
}

fn prometheus_type(metric: &Metric) -> Option<PrometheusType> {
    let cumulative = AggregationTemporality::Cumulative as i32;
    match metric.data.as_ref()? {
        Data::Gauge(_) => Some(PrometheusType::Gauge),
        Data::Sum(sum) if sum.aggregation_temporality == cumulative => Some(if sum.is_monotonic {
            PrometheusType::Counter
        } else {
            PrometheusType::Gauge
        }),
        Data::Histogram(histogram) if histogram.aggregation_temporality == cumulative => {
            Some(PrometheusType::Histogram)
        }
        _ => None,
    }
}

fn number_value(point: &NumberDataPoint) -> Option<Number> {
    match point.value.as_ref()? {
        number_data_point::Value::AsDouble(v) => Some(Number::Float(*v)),
        number_data_point::Value::AsInt(v) => Some(Number::Int(*v)),
    }
}

/// Whether `name` already ends in `_<unit>`
fn has_unit_suffix(name: &str, unit: &str) -> bool {
    name.strip_suffix(unit)
        .is_some_and(|rest| rest.ends_with('_'))
}

/// Bucket bounds render as integers when they are whole numbers
fn bound_value(bound: f64) -> Number {
    if bound.is_finite() && bound.fract() == 0.0 && bound.abs() < 1e15 {
        Number::Int(bound as i64)
    } else {
        Number::Float(bound)
    }
}

impl PrometheusWriter {
    pub fn new(config: WriterConfig) -> Self {
        Self {
            config,
            escaping: EscapingScheme::default(),
            format: ExpositionFormat::default(),
            unit_resolver: Arc::new(DefaultUnitResolver::default()),
            resource_labels: None,
        }
    }

    pub fn with_escaping(mut self, escaping: EscapingScheme) -> Self {
        self.escaping = escaping;
        self
    }

    pub fn with_format(mut self, format: ExpositionFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_unit_resolver(mut self, resolver: Arc<dyn UnitResolver + Send + Sync>) -> Self {
        self.unit_resolver = resolver;
        self
    }

    /// Copy resource attributes accepted by `filter` onto every series
    pub fn with_resource_constant_labels(mut self, filter: ResourceLabelFilter) -> Self {
        self.resource_labels = Some(filter);
        self
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn escaping(&self) -> EscapingScheme {
        self.escaping
    }

    pub fn format(&self) -> ExpositionFormat {
        self.format
    }

    /// Write a complete exposition document for `batch`
    pub fn write<W: Write + ?Sized>(&self, out: &mut W, batch: &MetricBatch) -> io::Result<()> {
        let unit_resolver = CachedUnitResolver::new(self.unit_resolver.as_ref());
        let mut families: BTreeMap<String, MetricFamily<'_>> = BTreeMap::new();
        let mut resource_labels: HashMap<ResourceKey, MetricLabels<'_>> = HashMap::new();
        let mut scope_labels: HashMap<ScopeKey, MetricLabels<'_>> = HashMap::new();

        for metric in batch.iter() {
            let Some(kind) = prometheus_type(metric.metric) else {
                trace!(name = %metric.metric.name, "Skipping metric without a prometheus representation");
                continue;
            };

            let type_suffix = self.format.type_suffix(kind);
            let mut name = self.escaping.escape(&metric.metric.name).into_owned();
            if let Some(suffix) = type_suffix
                && name.ends_with(suffix)
            {
                name.truncate(name.len() - suffix.len());
            }

            let unit = if self.config.without_units || metric.metric.unit.is_empty() {
                None
            } else {
                unit_resolver.resolve(&metric.metric.unit)
            };
            if let Some(unit) = &unit
                && !has_unit_suffix(&name, unit)
            {
                name.push('_');
                name.push_str(unit);
            }
            if let Some(suffix) = type_suffix
                && !self.config.without_type_suffix
            {
                name.push_str(suffix);
            }

            let description = metric.metric.description.as_str();
            let family = families.entry(name).or_insert_with_key(|name| {
                MetricFamily::new(name.clone(), unit.clone(), description, kind, type_suffix)
            });
            if family.unit != unit || family.kind != kind {
                error!(
                    name = %family.name,
                    units = ?(&family.unit, &unit),
                    types = ?(family.kind, kind),
                    "Dropping conflicting prometheus metric"
                );
                continue;
            }
            if family.description != description {
                warn!(
                    name = %family.name,
                    descriptions = ?(family.description, description),
                    "Ignoring conflicting description of prometheus metric"
                );
            }
            family.metrics.push(metric);

            let resource = match resource_labels.entry(metric.resource_key) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    if !self.config.without_target_info && self.format.supports_target_info() {
                        self.write_target_info(out, metric.resource_attributes)?;
                    }
                    entry.insert(self.resource_constant_labels(metric.resource_attributes))
                }
            };
            scope_labels
                .entry(metric.scope_key)
                .or_insert_with(|| resource.extended(self.scope_constant_labels(&metric)));
        }

        for family in families.values() {
            self.write_header(out, family)?;

            for metric in &family.metrics {
                let Some(constant) = scope_labels.get(&metric.scope_key) else {
                    continue;
                };
                match (family.kind, metric.metric.data.as_ref()) {
                    (PrometheusType::Gauge, Some(Data::Gauge(gauge))) => {
                        self.write_gauge(out, family, constant, &gauge.data_points)?
                    }
                    (PrometheusType::Gauge, Some(Data::Sum(sum))) => {
                        self.write_gauge(out, family, constant, &sum.data_points)?
                    }
                    (PrometheusType::Counter, Some(Data::Sum(sum))) => {
                        self.write_counter(out, family, constant, &sum.data_points)?
                    }
                    (PrometheusType::Histogram, Some(Data::Histogram(histogram))) => {
                        self.write_histogram(out, family, constant, &histogram.data_points)?
                    }
                    _ => {}
                }
            }
        }

        trace!(families = families.len(), "Wrote exposition document");
        out.write_all(b"# EOF\n")
    }

    fn label<'a>(&self, name: Cow<'a, str>, value: LabelValue<'a>) -> Label<'a> {
        let sanitized = match &name {
            Cow::Borrowed(borrowed) => self.escaping.escape(*borrowed),
            Cow::Owned(owned) => Cow::Owned(self.escaping.escape(owned).into_owned()),
        };
        Label {
            sanitized,
            name,
            value,
        }
    }

    fn attribute_label<'a>(&self, attribute: &'a KeyValue) -> Label<'a> {
        let value = attribute.value.as_ref().and_then(|v| v.value.as_ref());
        self.label(Cow::Borrowed(attribute.key.as_str()), LabelValue::from(value))
    }

    fn job_labels<'a>(&self, attributes: &'a [KeyValue]) -> Vec<Label<'a>> {
        if self.config.without_job_info {
            return Vec::new();
        }

        let service_name = find_string(attributes, "service.name")
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());
        let job = match find_string(attributes, "service.namespace") {
            Some(namespace) => format!("{namespace}/{service_name}"),
            None => service_name,
        };
        let instance = find_string(attributes, "service.instance.id").unwrap_or_default();

        vec![
            self.label(Cow::Borrowed("job"), LabelValue::from(job)),
            self.label(Cow::Borrowed("instance"), LabelValue::from(instance)),
        ]
    }

    fn resource_constant_labels<'a>(&self, attributes: &'a [KeyValue]) -> MetricLabels<'a> {
        let mut labels = Vec::new();
        if let Some(filter) = &self.resource_labels {
            labels.extend(
                attributes
                    .iter()
                    .filter(|attribute| filter(&attribute.key))
                    .map(|attribute| self.attribute_label(attribute)),
            );
        }
        labels.extend(self.job_labels(attributes));
        MetricLabels::new(labels)
    }

    fn scope_constant_labels<'a>(&self, metric: &MetricRef<'a>) -> Vec<Label<'a>> {
        if self.config.without_scope_info {
            return Vec::new();
        }

        let scope = metric.scope;
        let mut labels = vec![self.label(
            Cow::Borrowed("otel_scope_name"),
            LabelValue::from(scope.map_or("", |scope| scope.name.as_str())),
        )];
        if let Some(version) = scope
            .map(|scope| scope.version.as_str())
            .filter(|version| !version.is_empty())
        {
            labels.push(self.label(
                Cow::Borrowed("otel_scope_version"),
                LabelValue::from(version),
            ));
        }
        if !metric.scope_schema_url.is_empty() {
            labels.push(self.label(
                Cow::Borrowed("otel_scope_schema_url"),
                LabelValue::from(metric.scope_schema_url),
            ));
        }
        for attribute in scope.map(|scope| scope.attributes.as_slice()).unwrap_or_default() {
            let value = attribute.value.as_ref().and_then(|v| v.value.as_ref());
            labels.push(self.label(
                Cow::Owned(format!("otel_scope_{}", attribute.key)),
                LabelValue::from(value),
            ));
        }
        labels
    }

    fn write_target_info<W: Write + ?Sized>(
        &self,
        out: &mut W,
        attributes: &[KeyValue],
    ) -> io::Result<()> {
        out.write_all(b"# TYPE target info\n# HELP target Target metadata\ntarget_info{")?;
        let labels: Vec<Label<'_>> = attributes
            .iter()
            .map(|attribute| self.attribute_label(attribute))
            .chain(self.job_labels(attributes))
            .collect();
        let mut labels: Vec<&Label<'_>> = labels.iter().collect();
        labels.sort_by(|a, b| label_order(a, b));
        self.write_labels(out, &labels)?;
        out.write_all(b"} 1\n")
    }

    fn write_header<W: Write + ?Sized>(&self, out: &mut W, family: &MetricFamily<'_>) -> io::Result<()> {
        self.write_header_line(out, "TYPE", &family.name, family.kind.as_str())?;
        if let Some(unit) = family.unit.as_deref()
            && !self.config.without_units
        {
            self.write_header_line(out, "UNIT", &family.name, unit)?;
        }
        if !family.description.is_empty() {
            self.write_header_line(out, "HELP", &family.name, family.description)?;
        }
        Ok(())
    }

    fn write_header_line<W: Write + ?Sized>(
        &self,
        out: &mut W,
        keyword: &str,
        name: &str,
        text: &str,
    ) -> io::Result<()> {
        out.write_all(b"# ")?;
        out.write_all(keyword.as_bytes())?;
        out.write_all(b" ")?;
        if is_legacy_metric_name(name) {
            write_string(out, name)?;
        } else {
            out.write_all(b"\"")?;
            write_quoted(out, name)?;
            out.write_all(b"\"")?;
        }
        out.write_all(b" ")?;
        write_string(out, text)?;
        out.write_all(b"\n")
    }

    fn write_gauge<'a, W: Write + ?Sized>(
        &self,
        out: &mut W,
        family: &MetricFamily<'a>,
        constant: &MetricLabels<'a>,
        points: &'a [NumberDataPoint],
    ) -> io::Result<()> {
        for point in points {
            let Some(value) = number_value(point) else {
                continue;
            };
            let sample = Sample {
                suffix: "",
                value,
                timestamp: point.time_unix_nano,
                attributes: &point.attributes,
                le: None,
                exemplar: None,
            };
            self.write_sample(out, family, constant, sample)?;
        }
        Ok(())
    }

    fn write_counter<'a, W: Write + ?Sized>(
        &self,
        out: &mut W,
        family: &MetricFamily<'a>,
        constant: &MetricLabels<'a>,
        points: &'a [NumberDataPoint],
    ) -> io::Result<()> {
        for point in points {
            let Some(value) = number_value(point) else {
                continue;
            };
            let sample = Sample {
                suffix: "_total",
                value,
                timestamp: point.time_unix_nano,
                attributes: &point.attributes,
                le: None,
                exemplar: self.format.select_exemplar(&point.exemplars),
            };
            self.write_sample(out, family, constant, sample)?;
            if self.format.supports_created() {
                self.write_created(
                    out,
                    family,
                    constant,
                    point.start_time_unix_nano,
                    point.time_unix_nano,
                    &point.attributes,
                )?;
            }
        }
        Ok(())
    }

    fn write_histogram<'a, W: Write + ?Sized>(
        &self,
        out: &mut W,
        family: &MetricFamily<'a>,
        constant: &MetricLabels<'a>,
        points: &'a [HistogramDataPoint],
    ) -> io::Result<()> {
        for point in points {
            let fallback = [point.count];
            let (counts, bounds): (&[u64], &[f64]) = if point.bucket_counts.is_empty() {
                (&fallback, &[])
            } else {
                (&point.bucket_counts, &point.explicit_bounds)
            };

            let mut running_count: u64 = 0;
            let mut exemplar = None;
            for (i, count) in counts.iter().enumerate() {
                running_count += count;
                let lower = i
                    .checked_sub(1)
                    .and_then(|previous| bounds.get(previous))
                    .copied()
                    .unwrap_or(f64::NEG_INFINITY);
                let upper = bounds.get(i).copied().unwrap_or(f64::INFINITY);
                let candidates = point.exemplars.iter().filter(|candidate| {
                    exemplar_value(candidate).is_some_and(|value| {
                        let value = value.as_f64();
                        value > lower && value <= upper
                    })
                });
                exemplar = self.format.select_exemplar(candidates).or(exemplar);

                let sample = Sample {
                    suffix: "_bucket",
                    value: Number::UInt(running_count),
                    timestamp: point.time_unix_nano,
                    attributes: &point.attributes,
                    le: Some(upper),
                    exemplar,
                };
                self.write_sample(out, family, constant, sample)?;
            }

            if let Some(sum) = point.sum {
                let sample = Sample {
                    suffix: "_sum",
                    value: Number::Float(sum),
                    timestamp: point.time_unix_nano,
                    attributes: &point.attributes,
                    le: None,
                    exemplar: None,
                };
                self.write_sample(out, family, constant, sample)?;
            }

            debug_assert_eq!(
                running_count, point.count,
                "histogram bucket counts must add up to the data point count"
            );
            let sample = Sample {
                suffix: "_count",
                value: Number::UInt(point.count),
                timestamp: point.time_unix_nano,
                attributes: &point.attributes,
                le: None,
                exemplar: None,
            };
            self.write_sample(out, family, constant, sample)?;

            if self.format.supports_created() {
                self.write_created(
                    out,
                    family,
                    constant,
                    point.start_time_unix_nano,
                    point.time_unix_nano,
                    &point.attributes,
                )?;
            }
        }
        Ok(())
    }

    fn write_created<'a, W: Write + ?Sized>(
        &self,
        out: &mut W,
        family: &MetricFamily<'a>,
        constant: &MetricLabels<'a>,
        start: u64,
        timestamp: u64,
        attributes: &'a [KeyValue],
    ) -> io::Result<()> {
        let sample = Sample {
            suffix: "_created",
            value: Number::Float(self.format.timestamp_value(start)),
            timestamp,
            attributes,
            le: None,
            exemplar: None,
        };
        self.write_sample(out, family, constant, sample)
    }

    fn write_sample<'a, W: Write + ?Sized>(
        &self,
        out: &mut W,
        family: &MetricFamily<'a>,
        constant: &MetricLabels<'a>,
        sample: Sample<'a>,
    ) -> io::Result<()> {
        let mut point_labels: Vec<Label<'a>> = sample
            .attributes
            .iter()
            .map(|attribute| self.attribute_label(attribute))
            .collect();
        if let Some(bound) = sample.le {
            point_labels.push(self.label(Cow::Borrowed("le"), LabelValue::Number(bound_value(bound))));
        }

        let mut labels: Vec<&Label<'a>> = constant.iter().chain(point_labels.iter()).collect();
        labels.sort_by(|a, b| label_order(a, b));

        let write_suffix = family.type_suffix != Some(sample.suffix);
        if is_legacy_metric_name(&family.name) {
            write_string(out, &family.name)?;
            if write_suffix {
                write_string(out, sample.suffix)?;
            }
            if !labels.is_empty() {
                out.write_all(b"{")?;
                self.write_labels(out, &labels)?;
                out.write_all(b"}")?;
            }
        } else {
            out.write_all(b"{\"")?;
            write_quoted(out, &family.name)?;
            if write_suffix {
                write_quoted(out, sample.suffix)?;
            }
            out.write_all(b"\"")?;
            if !labels.is_empty() {
                out.write_all(b",")?;
                self.write_labels(out, &labels)?;
            }
            out.write_all(b"}")?;
        }

        out.write_all(b" ")?;
        write_number(out, sample.value)?;
        if !self.config.without_timestamps {
            out.write_all(b" ")?;
            write_string(out, &self.format.format_timestamp(sample.timestamp))?;
        }
        if let Some(exemplar) = sample.exemplar {
            self.write_exemplar(out, exemplar)?;
        }
        out.write_all(b"\n")
    }

    fn write_exemplar<W: Write + ?Sized>(&self, out: &mut W, exemplar: &Exemplar) -> io::Result<()> {
        let Some(value) = exemplar_value(exemplar) else {
            return Ok(());
        };

        let mut span_labels: Vec<Label<'_>> = Vec::new();
        if !exemplar.trace_id.is_empty() || !exemplar.span_id.is_empty() {
            span_labels.push(self.label(
                Cow::Borrowed("trace_id"),
                LabelValue::from(hex::encode(&exemplar.trace_id)),
            ));
            span_labels.push(self.label(
                Cow::Borrowed("span_id"),
                LabelValue::from(hex::encode(&exemplar.span_id)),
            ));
        }
        let attribute_labels: Vec<Label<'_>> = exemplar
            .filtered_attributes
            .iter()
            .map(|attribute| self.attribute_label(attribute))
            .collect();

        let mut labels: Vec<&Label<'_>> = span_labels.iter().chain(attribute_labels.iter()).collect();
        labels.sort_by(|a, b| label_order(a, b));

        let mut length = LengthSink::new();
        self.write_labels(&mut length, &labels)?;
        length.end()?;
        if length
            .final_length()
            .is_none_or(|length| length > EXEMPLAR_LABELS_MAX_LENGTH)
        {
            labels = span_labels.iter().collect();
            labels.sort_by(|a, b| label_order(a, b));
        }

        out.write_all(b" # {")?;
        self.write_labels(out, &labels)?;
        out.write_all(b"} ")?;
        write_number(out, value)?;
        out.write_all(b" ")?;
        write_string(out, &self.format.format_timestamp(exemplar.time_unix_nano))
    }

    /// Write sorted labels; equal sanitized names share one occurrence with
    /// their values joined by `;`
    fn write_labels<W: Write + ?Sized>(&self, out: &mut W, labels: &[&Label<'_>]) -> io::Result<()> {
        let mut previous: Option<&str> = None;
        for label in labels {
            let sanitized = label.sanitized.as_ref();
            if previous == Some(sanitized) {
                out.write_all(b";")?;
            } else {
                if previous.is_some() {
                    out.write_all(b"\",")?;
                }
                if is_legacy_label_name(sanitized) {
                    write_string(out, sanitized)?;
                } else {
                    out.write_all(b"\"")?;
                    write_quoted(out, sanitized)?;
                    out.write_all(b"\"")?;
                }
                out.write_all(b"=\"")?;
            }
            write_label_value(out, &label.value)?;
            previous = Some(sanitized);
        }
        if previous.is_some() {
            out.write_all(b"\"")?;
        }
        Ok(())
    }
}

fn write_label_value<W: Write + ?Sized>(out: &mut W, value: &LabelValue<'_>) -> io::Result<()> {
    match value {
        LabelValue::Null => out.write_all(b"null"),
        LabelValue::Text(text) => write_quoted(out, text),
        LabelValue::Number(number) => write_number(out, *number),
        LabelValue::Attribute(value) => write_attribute_value(out, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::metrics::v1::{Gauge, Histogram, Sum};

    fn metric(data: Data) -> Metric {
        Metric {
            name: "m".to_string(),
            data: Some(data),
            ..Default::default()
        }
    }

    #[test]
    fn test_prometheus_type() {
        let cumulative = AggregationTemporality::Cumulative as i32;
        let delta = AggregationTemporality::Delta as i32;

        let sum = |temporality, monotonic| {
            metric(Data::Sum(Sum {
                data_points: vec![],
                aggregation_temporality: temporality,
                is_monotonic: monotonic,
            }))
        };
        assert_eq!(prometheus_type(&sum(cumulative, true)), Some(PrometheusType::Counter));
        assert_eq!(prometheus_type(&sum(cumulative, false)), Some(PrometheusType::Gauge));
        assert_eq!(prometheus_type(&sum(delta, true)), None);

        assert_eq!(
            prometheus_type(&metric(Data::Gauge(Gauge::default()))),
            Some(PrometheusType::Gauge)
        );
        assert_eq!(
            prometheus_type(&metric(Data::Histogram(Histogram {
                data_points: vec![],
                aggregation_temporality: cumulative,
            }))),
            Some(PrometheusType::Histogram)
        );
        assert_eq!(
            prometheus_type(&metric(Data::Histogram(Histogram {
                data_points: vec![],
                aggregation_temporality: delta,
            }))),
            None
        );
        assert_eq!(prometheus_type(&Metric::default()), None);
    }

    #[test]
    fn test_has_unit_suffix() {
        assert!(has_unit_suffix("memory_bytes", "bytes"));
        assert!(!has_unit_suffix("membytes", "bytes"));
        assert!(!has_unit_suffix("bytes", "bytes"));
        assert!(!has_unit_suffix("memory", "bytes"));
    }

    #[test]
    fn test_bound_value() {
        assert_eq!(bound_value(10.0), Number::Int(10));
        assert_eq!(bound_value(-5.0), Number::Int(-5));
        assert_eq!(bound_value(0.5), Number::Float(0.5));
        assert_eq!(bound_value(f64::INFINITY), Number::Float(f64::INFINITY));
    }

    #[test]
    fn test_labels_merge_on_equal_sanitized_names() {
        let writer = PrometheusWriter::default();
        let first = writer.label(Cow::Borrowed("a.b"), LabelValue::from("x"));
        let second = writer.label(Cow::Borrowed("a/b"), LabelValue::from("y"));
        let third = writer.label(Cow::Borrowed("c d"), LabelValue::Number(Number::Int(1)));
        let mut labels = vec![&third, &second, &first];
        labels.sort_by(|a, b| label_order(a, b));

        let mut out = Vec::new();
        writer.write_labels(&mut out, &labels).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a_b=\"x;y\",c_d=\"1\"");
    }

    #[test]
    fn test_non_legacy_label_names_are_quoted() {
        let writer = PrometheusWriter::default().with_escaping(EscapingScheme::AllowUtf8);
        let label = writer.label(Cow::Borrowed("http.method"), LabelValue::from("GET"));

        let mut out = Vec::new();
        writer.write_labels(&mut out, &[&label]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "\"http.method\"=\"GET\"");
    }
}
