use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::Notice;

use super::quota::{self, OffCandidate};
use super::{Engine, EngineError};

/// Build a validated range from raw endpoints. Rejects inverted, oversized,
/// and out-of-window ranges before any `DayRange` exists.
pub(super) fn checked_range(start: NaiveDate, end: NaiveDate) -> Result<DayRange, EngineError> {
    if start > end {
        return Err(EngineError::Validation("start date after end date".into()));
    }
    for year in [start.year(), end.year()] {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(EngineError::Validation(format!("year {year} out of range")));
        }
    }
    let range = DayRange::new(start, end);
    if range.num_days() > MAX_RANGE_DAYS {
        return Err(EngineError::Validation("date range too wide".into()));
    }
    Ok(range)
}

fn checked_text(field: &str, value: &str, max: usize) -> Result<(), EngineError> {
    if value.len() > max {
        return Err(EngineError::Validation(format!("{field} too long")));
    }
    Ok(())
}

impl Engine {
    // ── vehicle driver field ─────────────────────────────────
    //
    // The denormalized driver name has exactly three write paths. Nothing
    // else in the process mutates it.

    pub async fn assign_driver(&self, vehicle_id: Ulid, name: &str) -> Result<(), EngineError> {
        checked_text("driver name", name, MAX_NAME_LEN)?;
        if !self
            .store()
            .set_vehicle_driver(vehicle_id, Some(name.to_string()))
            .await?
        {
            return Err(EngineError::NotFound(vehicle_id));
        }
        Ok(())
    }

    pub async fn unassign_driver(&self, vehicle_id: Ulid) -> Result<(), EngineError> {
        if !self.store().set_vehicle_driver(vehicle_id, None).await? {
            return Err(EngineError::NotFound(vehicle_id));
        }
        Ok(())
    }

    pub(crate) async fn restore_driver(
        &self,
        vehicle_id: Ulid,
        original: Option<String>,
    ) -> Result<(), EngineError> {
        if !self.store().set_vehicle_driver(vehicle_id, original).await? {
            return Err(EngineError::NotFound(vehicle_id));
        }
        Ok(())
    }

    // ── inoperative periods ──────────────────────────────────

    pub async fn open_inoperative_period(
        &self,
        vehicle_id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
        kind: InoperativeKind,
        reason: String,
    ) -> Result<Ulid, EngineError> {
        let range = checked_range(start, end)?;
        checked_text("reason", &reason, MAX_REASON_LEN)?;
        let vehicle = self
            .store()
            .vehicle(vehicle_id)
            .await?
            .ok_or(EngineError::NotFound(vehicle_id))?;

        let period = InoperativePeriod {
            id: Ulid::new(),
            vehicle_id,
            range,
            kind,
            reason: reason.clone(),
            original_driver: vehicle.driver.clone(),
            status: PeriodStatus::Active,
        };
        let id = period.id;
        self.store().insert_inoperative_period(period).await?;
        self.store()
            .set_vehicle_status(vehicle_id, VehicleStatus::Repair)
            .await?;

        self.notify.send(&Notice::InoperativePeriodOpened {
            vehicle_id,
            plate_no: vehicle.plate_no,
            range,
            kind: kind.label(),
            reason,
        });
        Ok(id)
    }

    /// Conditionally complete a period and bring the vehicle back to
    /// `Normal`. Returns false when another caller (or a previous sweep)
    /// already completed it.
    pub async fn close_inoperative_period(&self, id: Ulid) -> Result<bool, EngineError> {
        let period = self
            .store()
            .inoperative_period(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if !self.store().complete_inoperative_period(id).await? {
            return Ok(false);
        }
        self.store()
            .set_vehicle_status(period.vehicle_id, VehicleStatus::Normal)
            .await?;

        if let Some(vehicle) = self.store().vehicle(period.vehicle_id).await? {
            self.notify.send(&Notice::InoperativePeriodClosed {
                vehicle_id: vehicle.id,
                plate_no: vehicle.plate_no,
            });
        }
        Ok(true)
    }

    /// Active periods whose end date has passed — the sweep's work list.
    pub async fn expired_inoperative_periods(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<InoperativePeriod>, EngineError> {
        let mut periods = self.store().active_inoperative_periods().await?;
        periods.retain(|p| p.range.end < today);
        Ok(periods)
    }

    // ── inspection bookings ──────────────────────────────────

    pub async fn book_inspection(
        &self,
        vehicle_id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
        deadline: NaiveDate,
        memo: String,
        kind: InspectionKind,
    ) -> Result<Ulid, EngineError> {
        let range = checked_range(start, end)?;
        if range.end > deadline {
            return Err(EngineError::Validation(
                "scheduled range ends after the inspection deadline".into(),
            ));
        }
        checked_text("memo", &memo, MAX_NAME_LEN)?;
        let vehicle = self
            .store()
            .vehicle(vehicle_id)
            .await?
            .ok_or(EngineError::NotFound(vehicle_id))?;

        let booking = InspectionBooking {
            id: Ulid::new(),
            vehicle_id,
            range,
            deadline,
            memo,
            kind,
        };
        let id = booking.id;
        self.store().insert_inspection_booking(booking).await?;

        self.notify.send(&Notice::InspectionBooked {
            vehicle_id,
            plate_no: vehicle.plate_no,
            range,
            deadline,
        });
        Ok(id)
    }

    pub async fn cancel_inspection(&self, id: Ulid) -> Result<(), EngineError> {
        let booking = self
            .store()
            .delete_inspection_booking(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if let Some(vehicle) = self.store().vehicle(booking.vehicle_id).await? {
            self.notify.send(&Notice::InspectionCancelled {
                vehicle_id: vehicle.id,
                plate_no: vehicle.plate_no,
            });
        }
        Ok(())
    }

    // ── temporary assignments ────────────────────────────────

    pub async fn start_temporary_assignment(
        &self,
        driver_id: Ulid,
        vehicle_id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
    ) -> Result<Ulid, EngineError> {
        let range = checked_range(start, end)?;
        let driver = self
            .store()
            .driver(driver_id)
            .await?
            .ok_or(EngineError::NotFound(driver_id))?;
        let vehicle = self
            .store()
            .vehicle(vehicle_id)
            .await?
            .ok_or(EngineError::NotFound(vehicle_id))?;

        let ctx = self.snapshot(range).await?;
        let eligible = super::roster::available_drivers_for(range.start, &range, &ctx)
            .iter()
            .any(|d| d.id == driver_id);
        if !eligible {
            return Err(EngineError::Validation(format!(
                "driver {} is not available for {} to {}",
                driver.name, range.start, range.end
            )));
        }

        let assignment = TemporaryAssignment {
            id: Ulid::new(),
            driver_id,
            driver_name: driver.name.clone(),
            vehicle_id,
            range,
            original_driver: vehicle.driver.clone(),
        };
        let id = assignment.id;
        self.store().insert_temporary_assignment(assignment).await?;

        // While the window covers today the vehicle shows the temporary
        // driver; the sweep restores the original after the window closes.
        if range.contains(today) {
            self.assign_driver(vehicle_id, &driver.name).await?;
        }

        self.notify.send(&Notice::TemporaryAssignmentStarted {
            vehicle_id,
            plate_no: vehicle.plate_no,
            range,
            driver: driver.name,
        });
        Ok(id)
    }

    /// Atomically retire an assignment and restore the captured original
    /// driver (possibly none — the vehicle goes unassigned). Returns false
    /// when another caller already took the record.
    pub async fn end_temporary_assignment(&self, id: Ulid) -> Result<bool, EngineError> {
        let Some(assignment) = self.store().take_temporary_assignment(id).await? else {
            return Ok(false);
        };
        self.restore_driver(assignment.vehicle_id, assignment.original_driver.clone())
            .await?;

        if let Some(vehicle) = self.store().vehicle(assignment.vehicle_id).await? {
            self.notify.send(&Notice::AssignmentRestored {
                vehicle_id: vehicle.id,
                plate_no: vehicle.plate_no,
                driver: assignment.original_driver,
            });
        }
        Ok(true)
    }

    /// Assignments whose end date has passed — the sweep's work list.
    pub async fn expired_temporary_assignments(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<TemporaryAssignment>, EngineError> {
        let mut assignments = self.store().temporary_assignments().await?;
        assignments.retain(|a| a.range.end < today);
        Ok(assignments)
    }

    // ── assignment changes ───────────────────────────────────

    pub async fn record_assignment_change(
        &self,
        vehicle_id: Ulid,
        new_driver_id: Ulid,
        date: NaiveDate,
        reason: String,
        temporary: bool,
    ) -> Result<Ulid, EngineError> {
        checked_range(date, date)?;
        checked_text("reason", &reason, MAX_REASON_LEN)?;
        let vehicle = self
            .store()
            .vehicle(vehicle_id)
            .await?
            .ok_or(EngineError::NotFound(vehicle_id))?;
        let new_driver = self
            .store()
            .driver(new_driver_id)
            .await?
            .ok_or(EngineError::NotFound(new_driver_id))?;

        let original_driver_id = self
            .store()
            .drivers()
            .await?
            .iter()
            .find(|d| d.vehicle_id == Some(vehicle_id))
            .map(|d| d.id);

        let change = AssignmentChange {
            id: Ulid::new(),
            vehicle_id,
            date,
            original_driver_id,
            original_driver_name: vehicle.driver.clone(),
            new_driver_id,
            new_driver_name: new_driver.name.clone(),
            reason,
            temporary,
        };
        let id = change.id;
        self.store().insert_assignment_change(change).await?;

        self.notify.send(&Notice::VehicleReassigned {
            vehicle_id,
            plate_no: vehicle.plate_no,
            date,
            driver: new_driver.name,
        });
        Ok(id)
    }

    // ── vacation requests ────────────────────────────────────

    /// Shared quota gate. Checks the limit before counting so an explicit
    /// zero rejects outright, then counts current day-offs excluding the
    /// drivers whose own records the write supersedes.
    async fn check_day_off_quota(
        &self,
        date: NaiveDate,
        team: &str,
        superseded: &HashSet<Ulid>,
        requested: u32,
    ) -> Result<(), EngineError> {
        let settings = self.current_settings();
        if settings.limit_for(date, team) == 0 {
            metrics::counter!(crate::observability::QUOTA_REJECTIONS_TOTAL).increment(1);
            return Err(EngineError::QuotaExceeded {
                date,
                team: team.to_string(),
                limit: 0,
                existing: 0,
                requested,
            });
        }
        let vacations = self.store().vacation_requests_in(DayRange::day(date)).await?;
        let existing = quota::existing_off_count(&vacations, date, team, false, superseded);
        quota::check_quota(&settings, date, team, existing, requested).inspect_err(|_| {
            metrics::counter!(crate::observability::QUOTA_REJECTIONS_TOTAL).increment(1);
        })
    }

    /// Driver self-service day-off request. Needs lead time; admins use
    /// [`Engine::set_work_status`] instead.
    pub async fn request_day_off(
        &self,
        driver_id: Ulid,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<(), EngineError> {
        let driver = self
            .store()
            .driver(driver_id)
            .await?
            .ok_or(EngineError::NotFound(driver_id))?;
        if (date - today).num_days() < SELF_SERVICE_LEAD_DAYS {
            return Err(EngineError::Validation(format!(
                "day-off requests need {SELF_SERVICE_LEAD_DAYS} days lead time"
            )));
        }
        self.check_day_off_quota(date, &driver.team, &HashSet::from([driver_id]), 1)
            .await?;

        let external = driver.is_external();
        self.store()
            .upsert_vacation_request(VacationRequest {
                id: Ulid::new(),
                driver_id,
                date,
                work_status: WorkStatus::DayOff,
                team: driver.team,
                external,
            })
            .await?;
        Ok(())
    }

    /// Driver self-service cancellation, same lead-time rule as creation.
    pub async fn cancel_day_off(
        &self,
        driver_id: Ulid,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<(), EngineError> {
        if (date - today).num_days() < SELF_SERVICE_LEAD_DAYS {
            return Err(EngineError::Validation(format!(
                "day-off cancellations need {SELF_SERVICE_LEAD_DAYS} days lead time"
            )));
        }
        if !self
            .store()
            .delete_vacation_request(driver_id, date)
            .await?
        {
            return Err(EngineError::NotFound(driver_id));
        }
        Ok(())
    }

    /// Admin single-driver status write. No lead-time restriction; day-off
    /// writes still pass the quota gate.
    pub async fn set_work_status(
        &self,
        driver_id: Ulid,
        date: NaiveDate,
        work_status: WorkStatus,
    ) -> Result<(), EngineError> {
        checked_range(date, date)?;
        let driver = self
            .store()
            .driver(driver_id)
            .await?
            .ok_or(EngineError::NotFound(driver_id))?;
        if work_status.is_off() {
            self.check_day_off_quota(date, &driver.team, &HashSet::from([driver_id]), 1)
                .await?;
        }
        let external = driver.is_external();
        self.store()
            .upsert_vacation_request(VacationRequest {
                id: Ulid::new(),
                driver_id,
                date,
                work_status,
                team: driver.team,
                external,
            })
            .await?;
        Ok(())
    }

    /// Admin bulk status write. The whole batch is validated against every
    /// affected (date, team) pair before the first record is written, so a
    /// rejection never leaves a half-applied batch.
    pub async fn set_work_status_bulk(
        &self,
        entries: Vec<(Ulid, NaiveDate, WorkStatus)>,
    ) -> Result<(), EngineError> {
        if entries.is_empty() {
            return Ok(());
        }
        if entries.len() > MAX_BATCH_SIZE {
            return Err(EngineError::Validation("batch too large".into()));
        }

        let drivers: HashMap<Ulid, Driver> = self
            .store()
            .drivers()
            .await?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        let mut candidates = Vec::new();
        let mut span: Option<DayRange> = None;
        for (driver_id, date, work_status) in &entries {
            checked_range(*date, *date)?;
            let driver = drivers
                .get(driver_id)
                .ok_or(EngineError::NotFound(*driver_id))?;
            if work_status.is_off() {
                candidates.push(OffCandidate {
                    driver_id: *driver_id,
                    date: *date,
                    team: driver.team.clone(),
                });
            }
            span = Some(match span {
                None => DayRange::day(*date),
                Some(r) => DayRange::new(r.start.min(*date), r.end.max(*date)),
            });
        }

        // Phase 1: dry-run the whole batch.
        if !candidates.is_empty()
            && let Some(span) = span {
                let settings = self.current_settings();
                let vacations = self.store().vacation_requests_in(span).await?;
                quota::validate_bulk(&settings, &candidates, &vacations).inspect_err(|_| {
                    metrics::counter!(crate::observability::QUOTA_REJECTIONS_TOTAL).increment(1);
                })?;
            }

        // Phase 2: all validated — commit every record.
        for (driver_id, date, work_status) in entries {
            let driver = &drivers[&driver_id];
            self.store()
                .upsert_vacation_request(VacationRequest {
                    id: Ulid::new(),
                    driver_id,
                    date,
                    work_status,
                    team: driver.team.clone(),
                    external: driver.is_external(),
                })
                .await?;
        }
        Ok(())
    }
}
