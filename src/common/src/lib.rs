pub mod config;
pub mod model;

pub use model::{MetricBatch, MetricRef, ResourceKey, ScopeKey};
