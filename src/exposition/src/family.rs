//! Metric families and sorted label sets

use std::borrow::Cow;

use common::MetricRef;
use opentelemetry_proto::tonic::common::v1::any_value;

use crate::text::Number;

/// Prometheus metric type of a family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrometheusType {
    Gauge,
    Counter,
    Histogram,
}

impl PrometheusType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrometheusType::Gauge => "gauge",
            PrometheusType::Counter => "counter",
            PrometheusType::Histogram => "histogram",
        }
    }
}

/// Metrics sharing one final exposition name
#[derive(Debug)]
pub struct MetricFamily<'a> {
    pub name: String,
    pub unit: Option<String>,
    pub description: &'a str,
    pub kind: PrometheusType,
    pub type_suffix: Option<&'static str>,
    pub metrics: Vec<MetricRef<'a>>,
}

impl<'a> MetricFamily<'a> {
    pub fn new(
        name: String,
        unit: Option<String>,
        description: &'a str,
        kind: PrometheusType,
        type_suffix: Option<&'static str>,
    ) -> Self {
        Self {
            name,
            unit,
            description,
            kind,
            type_suffix,
            metrics: Vec::new(),
        }
    }
}

/// Value carried by a label before rendering
#[derive(Debug, Clone)]
pub enum LabelValue<'a> {
    Null,
    Text(Cow<'a, str>),
    Number(Number),
    Attribute(&'a any_value::Value),
}

impl<'a> From<&'a str> for LabelValue<'a> {
    fn from(value: &'a str) -> Self {
        LabelValue::Text(Cow::Borrowed(value))
    }
}

impl From<String> for LabelValue<'_> {
    fn from(value: String) -> Self {
        LabelValue::Text(Cow::Owned(value))
    }
}

impl<'a> From<Option<&'a any_value::Value>> for LabelValue<'a> {
    fn from(value: Option<&'a any_value::Value>) -> Self {
        value.map_or(LabelValue::Null, LabelValue::Attribute)
    }
}

/// One label with both its escaped and its original name
#[derive(Debug, Clone)]
pub struct Label<'a> {
    pub sanitized: Cow<'a, str>,
    pub name: Cow<'a, str>,
    pub value: LabelValue<'a>,
}

/// Order in which labels are written; equal sanitized names end up adjacent
pub(crate) fn label_order(a: &Label<'_>, b: &Label<'_>) -> std::cmp::Ordering {
    a.sanitized
        .cmp(&b.sanitized)
        .then_with(|| a.name.cmp(&b.name))
}

/// Label set kept sorted by sanitized name
#[derive(Debug, Clone, Default)]
pub struct MetricLabels<'a> {
    labels: Vec<Label<'a>>,
}

impl<'a> MetricLabels<'a> {
    pub fn new(labels: impl IntoIterator<Item = Label<'a>>) -> Self {
        let mut labels: Vec<_> = labels.into_iter().collect();
        labels.sort_by(label_order);
        Self { labels }
    }

    /// A copy of this set with `more` merged in
    pub fn extended(&self, more: impl IntoIterator<Item = Label<'a>>) -> Self {
        Self::new(self.labels.iter().cloned().chain(more))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Label<'a>> {
        self.labels.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }
}
