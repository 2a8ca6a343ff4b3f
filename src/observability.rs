use std::net::SocketAddr;

use crate::model::OperationStatus;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: status resolutions performed. Labels: status.
pub const RESOLVE_TOTAL: &str = "fleetops_resolve_total";

/// Counter: day-off requests rejected by the quota gate.
pub const QUOTA_REJECTIONS_TOTAL: &str = "fleetops_quota_rejections_total";

// ── Sweep metrics ───────────────────────────────────────────────

/// Counter: sweep passes executed.
pub const SWEEP_RUNS_TOTAL: &str = "fleetops_sweep_runs_total";

/// Counter: inoperative periods completed by the sweep.
pub const SWEEP_PERIODS_COMPLETED_TOTAL: &str = "fleetops_sweep_periods_completed_total";

/// Counter: temporary assignments retired by the sweep.
pub const SWEEP_ASSIGNMENTS_RESTORED_TOTAL: &str = "fleetops_sweep_assignments_restored_total";

/// Counter: per-record sweep failures (logged, not fatal).
pub const SWEEP_FAILURES_TOTAL: &str = "fleetops_sweep_failures_total";

/// Histogram: sweep pass duration in seconds.
pub const SWEEP_DURATION_SECONDS: &str = "fleetops_sweep_duration_seconds";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a resolved status to a short label for metrics.
pub fn status_label(status: OperationStatus) -> &'static str {
    match status {
        OperationStatus::Active => "active",
        OperationStatus::Reassigned => "reassigned",
        OperationStatus::InactiveVacation => "inactive_vacation",
        OperationStatus::InactiveInspection => "inactive_inspection",
        OperationStatus::InactiveRepair => "inactive_repair",
    }
}
