//! Metric recording via the `metrics` facade
//!
//! The core records counters and latency histograms; exporter wiring
//! (Prometheus, OTLP) is the serving shell's concern.

use std::time::Duration;

use metrics::{counter, histogram};

/// Static recording points for the serving core.
pub struct ServingMetrics;

impl ServingMetrics {
    pub fn record_predict(model: &str, success: bool, elapsed: Duration) {
        counter!(
            "serving_predict_requests_total",
            "model" => model.to_string(),
            "outcome" => outcome(success),
        )
        .increment(1);
        histogram!(
            "serving_predict_duration_seconds",
            "model" => model.to_string(),
        )
        .record(elapsed.as_secs_f64());
    }

    pub fn record_pipeline(pipeline: &str, success: bool, elapsed: Duration) {
        counter!(
            "serving_pipeline_requests_total",
            "pipeline" => pipeline.to_string(),
            "outcome" => outcome(success),
        )
        .increment(1);
        histogram!(
            "serving_pipeline_duration_seconds",
            "pipeline" => pipeline.to_string(),
        )
        .record(elapsed.as_secs_f64());
    }

    pub fn record_versions_loaded(model: &str, count: usize) {
        counter!("serving_model_versions_loaded_total", "model" => model.to_string())
            .increment(count as u64);
    }

    pub fn record_versions_retired(model: &str, count: usize) {
        counter!("serving_model_versions_retired_total", "model" => model.to_string())
            .increment(count as u64);
    }
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}
