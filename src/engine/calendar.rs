use std::collections::HashMap;

use chrono::{Datelike, Days, Months, NaiveDate};
use tracing::warn;
use ulid::Ulid;

use crate::limits::{MAX_YEAR, MIN_YEAR};
use crate::model::*;

use super::status::{resolve, ResolveContext};
use super::EngineError;

/// Two bookings claimed the same (vehicle, day). The earlier booking keeps
/// the slot; the conflict is surfaced, never silently merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingConflict {
    pub vehicle_id: Ulid,
    pub date: NaiveDate,
    pub kept: Ulid,
    pub rejected: Ulid,
}

/// Immutable per-day expansion of inspection bookings, keyed by
/// (vehicle, date). Rebuilt from scratch whenever the underlying bookings
/// change, so rebuilding is idempotent by construction.
#[derive(Default)]
pub struct BookingIndex {
    days: HashMap<(Ulid, NaiveDate), Ulid>,
    pub conflicts: Vec<BookingConflict>,
}

impl BookingIndex {
    pub fn build(bookings: &[InspectionBooking]) -> Self {
        let mut days: HashMap<(Ulid, NaiveDate), Ulid> = HashMap::new();
        let mut conflicts = Vec::new();

        for booking in bookings {
            for date in booking.range.days() {
                match days.entry((booking.vehicle_id, date)) {
                    std::collections::hash_map::Entry::Vacant(e) => {
                        e.insert(booking.id);
                    }
                    std::collections::hash_map::Entry::Occupied(e) => {
                        let kept = *e.get();
                        warn!(
                            vehicle = %booking.vehicle_id,
                            %date,
                            kept = %kept,
                            rejected = %booking.id,
                            "duplicate inspection booking day"
                        );
                        conflicts.push(BookingConflict {
                            vehicle_id: booking.vehicle_id,
                            date,
                            kept,
                            rejected: booking.id,
                        });
                    }
                }
            }
        }

        Self { days, conflicts }
    }

    pub fn booked(&self, vehicle_id: Ulid, date: NaiveDate) -> bool {
        self.days.contains_key(&(vehicle_id, date))
    }

    pub fn booking_on(&self, vehicle_id: Ulid, date: NaiveDate) -> Option<Ulid> {
        self.days.get(&(vehicle_id, date)).copied()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Booking-day entries falling on a given date, across all vehicles.
    pub fn count_on(&self, date: NaiveDate) -> usize {
        self.days.keys().filter(|(_, d)| *d == date).count()
    }
}

/// One row of the month view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    pub date: NaiveDate,
    /// False for leading/trailing days borrowed from adjacent months.
    pub in_month: bool,
    pub total_vehicles: usize,
    /// Vehicles the resolver reports as in the shop or at inspection.
    pub inactive: usize,
    /// Vehicles whose inspection deadline falls on this day.
    pub inspections_due: usize,
    /// Inspection reservation days on this date.
    pub reservations_done: usize,
}

/// Every day of the displayed calendar grid: full weeks from Sunday,
/// including leading/trailing days from adjacent months.
pub fn month_grid(year: i32, month: u32) -> Result<Vec<NaiveDate>, EngineError> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(EngineError::Validation(format!("year {year} out of range")));
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| EngineError::Validation(format!("invalid month {year}-{month:02}")))?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| EngineError::Validation("month arithmetic overflow".into()))?;

    let grid_start = first
        .checked_sub_days(Days::new(weekday_index(first) as u64))
        .ok_or_else(|| EngineError::Validation("grid start underflow".into()))?;
    let grid_end = last
        .checked_add_days(Days::new((6 - weekday_index(last)) as u64))
        .ok_or_else(|| EngineError::Validation("grid end overflow".into()))?;

    Ok(DayRange::new(grid_start, grid_end).days().collect())
}

/// Per-day counts for the whole displayed month.
pub fn month_view(
    year: i32,
    month: u32,
    vehicles: &[Vehicle],
    ctx: &ResolveContext,
) -> Result<Vec<DaySummary>, EngineError> {
    let grid = month_grid(year, month)?;
    let mut view = Vec::with_capacity(grid.len());

    for date in grid {
        let mut inactive = 0;
        let mut inspections_due = 0;
        for vehicle in vehicles {
            let resolved = resolve(vehicle, date, ctx);
            if matches!(
                resolved.status,
                OperationStatus::InactiveRepair | OperationStatus::InactiveInspection
            ) {
                inactive += 1;
            }
            if vehicle.next_inspection == Some(date) || vehicle.crane_inspection == Some(date) {
                inspections_due += 1;
            }
        }
        view.push(DaySummary {
            date,
            in_month: date.month() == month && date.year() == year,
            total_vehicles: vehicles.len(),
            inactive,
            inspections_due,
            reservations_done: ctx.bookings.count_on(date),
        });
    }

    Ok(view)
}
