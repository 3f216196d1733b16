//! Operation metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! hosting process installs a recorder.

use std::time::Duration;

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const OPERATIONS_TOTAL: &str = "dataproxy_operations_total";
    pub const OPERATION_DURATION_SECONDS: &str = "dataproxy_operation_duration_seconds";
    pub const RELATION_TRAVERSALS_TOTAL: &str = "dataproxy_relation_traversals_total";
}

/// Records one root field execution.
pub fn record_operation(field: &str, operation: &str, success: bool, duration: Duration) {
    counter!(
        names::OPERATIONS_TOTAL,
        "field" => field.to_string(),
        "operation" => operation.to_string(),
        "outcome" => outcome(success)
    )
    .increment(1);

    histogram!(
        names::OPERATION_DURATION_SECONDS,
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records one relation traversal.
pub fn record_relation(model: &str, field: &str, success: bool) {
    counter!(
        names::RELATION_TRAVERSALS_TOTAL,
        "model" => model.to_string(),
        "field" => field.to_string(),
        "outcome" => outcome(success)
    )
    .increment(1);
}

fn outcome(success: bool) -> &'static str {
    if success { "ok" } else { "error" }
}
