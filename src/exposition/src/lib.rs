//! Prometheus and OpenMetrics text exposition of OTLP metric batches

pub mod byte_stream;
pub mod escaping;
pub mod family;
pub mod format;
pub mod text;
pub mod units;
mod value;
pub mod writer;

pub use escaping::EscapingScheme;
pub use format::ExpositionFormat;
pub use units::{CachedUnitResolver, DefaultUnitResolver, UnitResolver};
pub use writer::{PrometheusWriter, ResourceLabelFilter, WriterConfig};
