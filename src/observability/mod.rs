//! Observability hooks for the serving core

pub mod metrics;

pub use metrics::ServingMetrics;
