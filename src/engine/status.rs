use std::collections::HashMap;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::calendar::BookingIndex;

/// Immutable snapshot of every schedule-affecting record, assembled once and
/// shared by the pure resolvers. Safe for any number of concurrent readers.
pub struct ResolveContext {
    pub drivers: Vec<Driver>,
    /// Active inoperative periods only.
    pub periods: Vec<InoperativePeriod>,
    pub bookings: BookingIndex,
    pub assignments: Vec<TemporaryAssignment>,
    pub changes: Vec<AssignmentChange>,
    pub vacations: Vec<VacationRequest>,
    /// Derived index over `vacations`, keyed by the natural key.
    statuses: HashMap<(Ulid, NaiveDate), WorkStatus>,
}

impl ResolveContext {
    pub fn new(
        drivers: Vec<Driver>,
        periods: Vec<InoperativePeriod>,
        bookings: BookingIndex,
        assignments: Vec<TemporaryAssignment>,
        changes: Vec<AssignmentChange>,
        vacations: Vec<VacationRequest>,
    ) -> Self {
        let statuses = vacations
            .iter()
            .map(|v| ((v.driver_id, v.date), v.work_status))
            .collect();
        Self {
            drivers,
            periods,
            bookings,
            assignments,
            changes,
            vacations,
            statuses,
        }
    }

    /// A driver with no record for a date is working. This is the one place
    /// that default is encoded.
    pub fn work_status(&self, driver_id: Ulid, date: NaiveDate) -> WorkStatus {
        self.statuses
            .get(&(driver_id, date))
            .copied()
            .unwrap_or(WorkStatus::Working)
    }

    pub fn is_off(&self, driver_id: Ulid, date: NaiveDate) -> bool {
        self.work_status(driver_id, date).is_off()
    }

    /// The driver structurally assigned to a vehicle, if any.
    pub fn structural_driver(&self, vehicle_id: Ulid) -> Option<&Driver> {
        self.drivers.iter().find(|d| d.vehicle_id == Some(vehicle_id))
    }

    pub fn period_covering(&self, vehicle_id: Ulid, date: NaiveDate) -> Option<&InoperativePeriod> {
        self.periods
            .iter()
            .find(|p| p.vehicle_id == vehicle_id && p.range.contains(date))
    }

    pub fn assignment_covering(
        &self,
        vehicle_id: Ulid,
        date: NaiveDate,
    ) -> Option<&TemporaryAssignment> {
        self.assignments
            .iter()
            .find(|a| a.vehicle_id == vehicle_id && a.active_on(date))
    }

    pub fn change_for(&self, vehicle_id: Ulid, date: NaiveDate) -> Option<&AssignmentChange> {
        self.changes
            .iter()
            .find(|c| c.vehicle_id == vehicle_id && c.date == date)
    }
}

/// Resolve one operational status for a (vehicle, date) pair.
///
/// Fixed precedence, first match wins. The order is deliberate: a vehicle
/// physically in the shop never shows as reassigned or on vacation, and a
/// day-specific reassignment overrides the structural driver's vacation
/// because the reassignment already accounts for the absence.
pub fn resolve(vehicle: &Vehicle, date: NaiveDate, ctx: &ResolveContext) -> VehicleOperationStatus {
    // 1. Inoperative period.
    if let Some(p) = ctx.period_covering(vehicle.id, date) {
        return VehicleOperationStatus {
            status: OperationStatus::InactiveRepair,
            reason: format!("{}: {}", p.kind.label(), p.reason),
            assigned_driver: None,
            original_driver: p.original_driver.clone(),
        };
    }

    // 2. Inspection reservation day.
    if ctx.bookings.booked(vehicle.id, date) {
        return VehicleOperationStatus {
            status: OperationStatus::InactiveInspection,
            reason: "inspection reservation day".into(),
            assigned_driver: None,
            original_driver: vehicle.driver.clone(),
        };
    }

    // 3. Temporary assignment.
    if let Some(a) = ctx.assignment_covering(vehicle.id, date) {
        return VehicleOperationStatus {
            status: OperationStatus::Active,
            reason: "temporary assignment".into(),
            assigned_driver: Some(a.driver_name.clone()),
            original_driver: a.original_driver.clone(),
        };
    }

    // 4. One-off assignment change.
    if let Some(c) = ctx.change_for(vehicle.id, date) {
        return VehicleOperationStatus {
            status: OperationStatus::Reassigned,
            reason: c.reason.clone(),
            assigned_driver: Some(c.new_driver_name.clone()),
            original_driver: c.original_driver_name.clone(),
        };
    }

    // 5. Structural driver on vacation.
    if let Some(d) = ctx.structural_driver(vehicle.id)
        && ctx.is_off(d.id, date) {
            return VehicleOperationStatus {
                status: OperationStatus::InactiveVacation,
                reason: format!("{} is off duty", d.name),
                assigned_driver: None,
                original_driver: Some(d.name.clone()),
            };
        }

    // 6. In service.
    VehicleOperationStatus {
        status: OperationStatus::Active,
        reason: "in service".into(),
        assigned_driver: vehicle.driver.clone(),
        original_driver: None,
    }
}
