use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::engine::Engine;

/// What one sweep pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub periods_completed: usize,
    pub assignments_restored: usize,
    pub failures: usize,
}

/// One expiry pass: complete inoperative periods that ended before `today`
/// and retire temporary assignments likewise, restoring each vehicle's
/// captured original driver.
///
/// Idempotent — the conditional store transitions fail closed, so a second
/// pass over the same data changes nothing. A failure on one record is
/// logged and counted; the rest of the sweep proceeds.
pub async fn run_sweep(engine: &Engine, today: NaiveDate) -> SweepReport {
    let started = Instant::now();
    let mut report = SweepReport::default();

    match engine.expired_inoperative_periods(today).await {
        Ok(expired) => {
            for period in expired {
                match engine.close_inoperative_period(period.id).await {
                    Ok(true) => {
                        info!(period = %period.id, vehicle = %period.vehicle_id, "completed expired inoperative period");
                        report.periods_completed += 1;
                    }
                    // Another sweep (or an admin) got there first.
                    Ok(false) => debug!(period = %period.id, "sweep skip: already completed"),
                    Err(e) => {
                        warn!(period = %period.id, "sweep: completing period failed: {e}");
                        report.failures += 1;
                    }
                }
            }
        }
        Err(e) => {
            warn!("sweep: listing expired inoperative periods failed: {e}");
            report.failures += 1;
        }
    }

    match engine.expired_temporary_assignments(today).await {
        Ok(expired) => {
            for assignment in expired {
                match engine.end_temporary_assignment(assignment.id).await {
                    Ok(true) => {
                        info!(
                            assignment = %assignment.id,
                            vehicle = %assignment.vehicle_id,
                            restored = assignment.original_driver.as_deref().unwrap_or("(unassigned)"),
                            "restored vehicle after expired assignment"
                        );
                        report.assignments_restored += 1;
                    }
                    Ok(false) => debug!(assignment = %assignment.id, "sweep skip: already retired"),
                    Err(e) => {
                        warn!(assignment = %assignment.id, "sweep: restoring assignment failed: {e}");
                        report.failures += 1;
                    }
                }
            }
        }
        Err(e) => {
            warn!("sweep: listing expired assignments failed: {e}");
            report.failures += 1;
        }
    }

    metrics::counter!(crate::observability::SWEEP_RUNS_TOTAL).increment(1);
    metrics::counter!(crate::observability::SWEEP_PERIODS_COMPLETED_TOTAL)
        .increment(report.periods_completed as u64);
    metrics::counter!(crate::observability::SWEEP_ASSIGNMENTS_RESTORED_TOTAL)
        .increment(report.assignments_restored as u64);
    metrics::counter!(crate::observability::SWEEP_FAILURES_TOTAL)
        .increment(report.failures as u64);
    metrics::histogram!(crate::observability::SWEEP_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    report
}

/// Background task: sweep at process start, then on a fixed interval. The
/// period must never exceed one day — records are day-granular and an
/// expired assignment must not outlive its window by a full cycle.
pub async fn run_scheduler(engine: Arc<Engine>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        // First tick fires immediately.
        interval.tick().await;
        let today = chrono::Local::now().date_naive();
        let report = run_sweep(&engine, today).await;
        if report != SweepReport::default() {
            info!(
                completed = report.periods_completed,
                restored = report.assignments_restored,
                failures = report.failures,
                "sweep pass finished"
            );
        }
    }
}
