use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Inclusive whole-day interval `[start, end]`. Every record in this domain
/// is day-granular; there is no time-of-day anywhere in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DayRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "DayRange start must not be after end");
        Self { start, end }
    }

    /// Single-day range.
    pub fn day(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Inclusive ranges overlap when neither ends before the other starts.
    pub fn overlaps(&self, other: &DayRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// Weekday index with Sunday = 0, matching the quota settings tables.
pub fn weekday_index(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

// ── Work status ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Working,
    DayOff,
    NightShift,
}

impl WorkStatus {
    pub fn is_off(&self) -> bool {
        matches!(self, WorkStatus::DayOff)
    }
}

// ── Vehicles & drivers ───────────────────────────────────────────

/// Entity-level vehicle condition. The per-date operational picture comes
/// from the status resolver, not from this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Normal,
    Inspection,
    Repair,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Ulid,
    pub plate_no: String,
    pub model: String,
    pub team: String,
    pub garage: String,
    /// Denormalized display name of the current driver. Written only through
    /// the engine's assign/unassign/restore paths.
    pub driver: Option<String>,
    pub status: VehicleStatus,
    pub last_inspection: Option<NaiveDate>,
    pub next_inspection: Option<NaiveDate>,
    /// Annual crane inspection deadline, for vehicles that carry one.
    pub crane_inspection: Option<NaiveDate>,
}

/// Employee numbers with this prefix belong to external (subcontracted)
/// drivers, who are excluded from quota headcounts.
pub const EXTERNAL_EMPLOYEE_PREFIX: &str = "X-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub id: Ulid,
    pub name: String,
    pub employee_no: String,
    pub team: String,
    /// Structural assignment. A driver with a vehicle is not a candidate for
    /// temporary assignment elsewhere.
    pub vehicle_id: Option<Ulid>,
    pub night_shift: bool,
    pub active: bool,
}

impl Driver {
    pub fn is_external(&self) -> bool {
        self.employee_no.starts_with(EXTERNAL_EMPLOYEE_PREFIX)
    }
}

// ── Date-ranged records ──────────────────────────────────────────

/// One row per (driver, calendar date). The store treats that pair as the
/// natural key; a new write supersedes the old record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacationRequest {
    pub id: Ulid,
    pub driver_id: Ulid,
    pub date: NaiveDate,
    pub work_status: WorkStatus,
    /// Team at creation time, not re-derived.
    pub team: String,
    pub external: bool,
}

impl VacationRequest {
    pub fn is_off(&self) -> bool {
        self.work_status.is_off()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InoperativeKind {
    Repair,
    Maintenance,
    Breakdown,
    Other,
}

impl InoperativeKind {
    pub fn label(&self) -> &'static str {
        match self {
            InoperativeKind::Repair => "repair",
            InoperativeKind::Maintenance => "maintenance",
            InoperativeKind::Breakdown => "breakdown",
            InoperativeKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InoperativePeriod {
    pub id: Ulid,
    pub vehicle_id: Ulid,
    pub range: DayRange,
    pub kind: InoperativeKind,
    pub reason: String,
    /// Driver on the vehicle when the period opened, restored on close.
    pub original_driver: Option<String>,
    pub status: PeriodStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionKind {
    Regular,
    CraneAnnual,
}

/// An inspection reservation. A single scheduled date is a one-day range.
/// The range must lie entirely on or before `deadline`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionBooking {
    pub id: Ulid,
    pub vehicle_id: Ulid,
    pub range: DayRange,
    pub deadline: NaiveDate,
    pub memo: String,
    pub kind: InspectionKind,
}

/// Multi-day substitution. While today is inside `range` the vehicle's
/// driver field shows the temporary driver; afterwards the sweep restores
/// `original_driver` (which may be absent — the vehicle goes unassigned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryAssignment {
    pub id: Ulid,
    pub driver_id: Ulid,
    pub driver_name: String,
    pub vehicle_id: Ulid,
    pub range: DayRange,
    pub original_driver: Option<String>,
}

impl TemporaryAssignment {
    pub fn active_on(&self, date: NaiveDate) -> bool {
        self.range.contains(date)
    }
}

/// One-off single-day substitution, distinct from a multi-day temporary
/// assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentChange {
    pub id: Ulid,
    pub vehicle_id: Ulid,
    pub date: NaiveDate,
    pub original_driver_id: Option<Ulid>,
    pub original_driver_name: Option<String>,
    pub new_driver_id: Ulid,
    pub new_driver_name: String,
    pub reason: String,
    pub temporary: bool,
}

// ── Resolved status ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Active,
    Reassigned,
    InactiveVacation,
    InactiveInspection,
    InactiveRepair,
}

impl OperationStatus {
    pub fn is_inactive(&self) -> bool {
        matches!(
            self,
            OperationStatus::InactiveVacation
                | OperationStatus::InactiveInspection
                | OperationStatus::InactiveRepair
        )
    }
}

/// The single answer the status resolver returns for a (vehicle, date) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleOperationStatus {
    pub status: OperationStatus,
    pub reason: String,
    pub assigned_driver: Option<String>,
    pub original_driver: Option<String>,
}
