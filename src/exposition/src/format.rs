//! Format-specific policy for the two exposition variants

use opentelemetry_proto::tonic::metrics::v1::Exemplar;

use crate::family::PrometheusType;
use crate::text::Number;

/// Exposition text variant a document is written in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpositionFormat {
    /// Classic Prometheus text format
    #[default]
    Prometheus,
    /// OpenMetrics text format
    OpenMetrics,
}

const NANOS_PER_MILLI: u64 = 1_000_000;

/// Round a nanosecond epoch timestamp half-up to milliseconds
fn round_to_millis(nanos: u64) -> u64 {
    nanos.saturating_add(NANOS_PER_MILLI / 2) / NANOS_PER_MILLI
}

pub(crate) fn exemplar_value(exemplar: &Exemplar) -> Option<Number> {
    use opentelemetry_proto::tonic::metrics::v1::exemplar::Value;

    match exemplar.value.as_ref()? {
        Value::AsDouble(v) => Some(Number::Float(*v)),
        Value::AsInt(v) => Some(Number::Int(*v)),
    }
}

impl ExpositionFormat {
    /// Pick the exemplar attached to a series out of `candidates`.
    ///
    /// OpenMetrics keeps the first exemplar with the greatest value; the
    /// Prometheus text format has no exemplar syntax.
    pub fn select_exemplar<'e, I>(&self, candidates: I) -> Option<&'e Exemplar>
    where
        I: IntoIterator<Item = &'e Exemplar>,
    {
        match self {
            ExpositionFormat::Prometheus => None,
            ExpositionFormat::OpenMetrics => {
                let mut selected: Option<(&'e Exemplar, f64)> = None;
                for exemplar in candidates {
                    let Some(value) = exemplar_value(exemplar) else {
                        continue;
                    };
                    let value = value.as_f64();
                    if selected.is_none_or(|(_, best)| best < value) {
                        selected = Some((exemplar, value));
                    }
                }
                selected.map(|(exemplar, _)| exemplar)
            }
        }
    }

    /// Render a nanosecond epoch timestamp
    pub fn format_timestamp(&self, nanos: u64) -> String {
        let millis = round_to_millis(nanos);
        match self {
            ExpositionFormat::Prometheus => millis.to_string(),
            ExpositionFormat::OpenMetrics => format!("{}.{:03}", millis / 1000, millis % 1000),
        }
    }

    /// A nanosecond epoch timestamp as a sample value in this format's time unit
    pub fn timestamp_value(&self, nanos: u64) -> f64 {
        match self {
            ExpositionFormat::Prometheus => nanos as f64 / 1e6,
            ExpositionFormat::OpenMetrics => nanos as f64 / 1e9,
        }
    }

    pub fn supports_target_info(&self) -> bool {
        matches!(self, ExpositionFormat::OpenMetrics)
    }

    /// Suffix the format expects on family names of the given type
    pub fn type_suffix(&self, kind: PrometheusType) -> Option<&'static str> {
        match (self, kind) {
            (ExpositionFormat::Prometheus, PrometheusType::Counter) => Some("_total"),
            _ => None,
        }
    }

    pub fn supports_created(&self) -> bool {
        matches!(self, ExpositionFormat::OpenMetrics)
    }
}
