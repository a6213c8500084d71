//! Core metrics definitions.
//!
//! Names follow Prometheus conventions: `_total` for counters, `_seconds`
//! for duration histograms.

use metrics::{describe_counter, describe_histogram};

/// Register all core metrics with descriptions.
pub fn register_core_metrics() {
    describe_counter!(
        "scos_components_total",
        "Components reaching the merge (by outcome: succeeded, fallback)"
    );
    describe_counter!(
        "scos_stage_failures_total",
        "Terminal per-component failures (by reason code)"
    );
    describe_histogram!("scos_build_duration_seconds", "Image build duration");
    describe_counter!("scos_db_errors_total", "State database write failures (by operation)");
}
