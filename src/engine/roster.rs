use chrono::NaiveDate;

use crate::model::*;

use super::status::ResolveContext;

/// Why a vehicle needs coverage on a given date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UncoveredReason {
    NoStructuralDriver,
    DriverOnVacation,
}

impl UncoveredReason {
    pub fn label(&self) -> &'static str {
        match self {
            UncoveredReason::NoStructuralDriver => "no structural driver",
            UncoveredReason::DriverOnVacation => "driver on vacation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncoveredVehicle {
    pub vehicle: Vehicle,
    pub reason: UncoveredReason,
}

/// Vehicles needing a driver on `date`: no structural driver, or the
/// structural driver is off. Vehicles already covered by a temporary
/// assignment or an assignment change for the date are excluded.
pub fn uncovered_vehicles_for(
    vehicles: &[Vehicle],
    date: NaiveDate,
    ctx: &ResolveContext,
) -> Vec<UncoveredVehicle> {
    vehicles
        .iter()
        .filter_map(|v| {
            if ctx.assignment_covering(v.id, date).is_some()
                || ctx.change_for(v.id, date).is_some()
            {
                return None;
            }
            match ctx.structural_driver(v.id) {
                None => Some(UncoveredVehicle {
                    vehicle: v.clone(),
                    reason: UncoveredReason::NoStructuralDriver,
                }),
                Some(d) if ctx.is_off(d.id, date) => Some(UncoveredVehicle {
                    vehicle: v.clone(),
                    reason: UncoveredReason::DriverOnVacation,
                }),
                Some(_) => None,
            }
        })
        .collect()
}

/// Drivers eligible to take a new temporary assignment covering `period`:
/// active, working on `date`, not structurally assigned, not the incoming
/// driver of an assignment change on `date`, and not already committed to a
/// temporary assignment overlapping the period.
pub fn available_drivers_for(
    date: NaiveDate,
    period: &DayRange,
    ctx: &ResolveContext,
) -> Vec<Driver> {
    ctx.drivers
        .iter()
        .filter(|d| {
            d.active
                && d.vehicle_id.is_none()
                && !ctx.is_off(d.id, date)
                && !ctx
                    .changes
                    .iter()
                    .any(|c| c.date == date && c.new_driver_id == d.id)
                && !ctx
                    .assignments
                    .iter()
                    .any(|a| a.driver_id == d.id && a.range.overlaps(period))
        })
        .cloned()
        .collect()
}
