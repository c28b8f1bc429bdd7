//! Metric batch model
//!
//! Batches are carried as OTLP protobuf messages. The helpers here flatten the
//! resource → scope → metric nesting while keeping track of which resource and
//! scope instance every metric came from.

pub mod attributes;
mod batch;

pub use batch::{MetricBatch, MetricRef, ResourceKey, ScopeKey};
