use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

/// Failure inside the persistence collaborator. Carried opaque; the engine
/// maps it to `EngineError::Persistence`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "store error: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

/// The external persistence collaborator. Entities are addressable by id and
/// filterable by date range; the sweep relies on the conditional primitives
/// (`complete_inoperative_period`, `take_temporary_assignment`) so that two
/// concurrent sweeps cannot both act on the same record.
#[async_trait]
pub trait Store: Send + Sync {
    // ── vehicles ─────────────────────────────────────────────
    async fn vehicles(&self) -> StoreResult<Vec<Vehicle>>;
    async fn vehicle(&self, id: Ulid) -> StoreResult<Option<Vehicle>>;
    async fn insert_vehicle(&self, vehicle: Vehicle) -> StoreResult<()>;
    /// The only write path for the denormalized driver field.
    async fn set_vehicle_driver(&self, id: Ulid, driver: Option<String>) -> StoreResult<bool>;
    async fn set_vehicle_status(&self, id: Ulid, status: VehicleStatus) -> StoreResult<bool>;

    // ── drivers ──────────────────────────────────────────────
    async fn drivers(&self) -> StoreResult<Vec<Driver>>;
    async fn driver(&self, id: Ulid) -> StoreResult<Option<Driver>>;
    async fn insert_driver(&self, driver: Driver) -> StoreResult<()>;

    // ── vacation requests (natural key: driver + date) ───────
    async fn vacation_requests_in(&self, range: DayRange) -> StoreResult<Vec<VacationRequest>>;
    async fn upsert_vacation_request(&self, request: VacationRequest) -> StoreResult<()>;
    async fn delete_vacation_request(&self, driver_id: Ulid, date: NaiveDate) -> StoreResult<bool>;

    // ── inoperative periods ──────────────────────────────────
    async fn inoperative_period(&self, id: Ulid) -> StoreResult<Option<InoperativePeriod>>;
    async fn active_inoperative_periods(&self) -> StoreResult<Vec<InoperativePeriod>>;
    async fn insert_inoperative_period(&self, period: InoperativePeriod) -> StoreResult<()>;
    /// Conditional transition active → completed. Returns false when the
    /// period was already completed or does not exist.
    async fn complete_inoperative_period(&self, id: Ulid) -> StoreResult<bool>;

    // ── inspection bookings ──────────────────────────────────
    async fn inspection_bookings(&self) -> StoreResult<Vec<InspectionBooking>>;
    async fn insert_inspection_booking(&self, booking: InspectionBooking) -> StoreResult<()>;
    async fn delete_inspection_booking(&self, id: Ulid) -> StoreResult<Option<InspectionBooking>>;

    // ── temporary assignments ────────────────────────────────
    async fn temporary_assignments(&self) -> StoreResult<Vec<TemporaryAssignment>>;
    async fn insert_temporary_assignment(&self, assignment: TemporaryAssignment) -> StoreResult<()>;
    /// Atomic remove-and-return. A second caller gets `None`.
    async fn take_temporary_assignment(&self, id: Ulid) -> StoreResult<Option<TemporaryAssignment>>;

    // ── assignment changes ───────────────────────────────────
    async fn assignment_changes_in(&self, range: DayRange) -> StoreResult<Vec<AssignmentChange>>;
    async fn insert_assignment_change(&self, change: AssignmentChange) -> StoreResult<()>;
}

/// In-process store used by the daemon and the test suite. Each map is keyed
/// the way the engine addresses the entity; vacation requests are keyed by
/// their natural key so an upsert supersedes the prior record by
/// construction.
#[derive(Default)]
pub struct MemoryStore {
    vehicles: DashMap<Ulid, Vehicle>,
    drivers: DashMap<Ulid, Driver>,
    vacation_requests: DashMap<(Ulid, NaiveDate), VacationRequest>,
    inoperative_periods: DashMap<Ulid, InoperativePeriod>,
    inspection_bookings: DashMap<Ulid, InspectionBooking>,
    temporary_assignments: DashMap<Ulid, TemporaryAssignment>,
    assignment_changes: DashMap<Ulid, AssignmentChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn vehicles(&self) -> StoreResult<Vec<Vehicle>> {
        Ok(self.vehicles.iter().map(|e| e.value().clone()).collect())
    }

    async fn vehicle(&self, id: Ulid) -> StoreResult<Option<Vehicle>> {
        Ok(self.vehicles.get(&id).map(|e| e.value().clone()))
    }

    async fn insert_vehicle(&self, vehicle: Vehicle) -> StoreResult<()> {
        self.vehicles.insert(vehicle.id, vehicle);
        Ok(())
    }

    async fn set_vehicle_driver(&self, id: Ulid, driver: Option<String>) -> StoreResult<bool> {
        match self.vehicles.get_mut(&id) {
            Some(mut v) => {
                v.driver = driver;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_vehicle_status(&self, id: Ulid, status: VehicleStatus) -> StoreResult<bool> {
        match self.vehicles.get_mut(&id) {
            Some(mut v) => {
                v.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn drivers(&self) -> StoreResult<Vec<Driver>> {
        Ok(self.drivers.iter().map(|e| e.value().clone()).collect())
    }

    async fn driver(&self, id: Ulid) -> StoreResult<Option<Driver>> {
        Ok(self.drivers.get(&id).map(|e| e.value().clone()))
    }

    async fn insert_driver(&self, driver: Driver) -> StoreResult<()> {
        self.drivers.insert(driver.id, driver);
        Ok(())
    }

    async fn vacation_requests_in(&self, range: DayRange) -> StoreResult<Vec<VacationRequest>> {
        Ok(self
            .vacation_requests
            .iter()
            .filter(|e| range.contains(e.value().date))
            .map(|e| e.value().clone())
            .collect())
    }

    async fn upsert_vacation_request(&self, request: VacationRequest) -> StoreResult<()> {
        self.vacation_requests
            .insert((request.driver_id, request.date), request);
        Ok(())
    }

    async fn delete_vacation_request(&self, driver_id: Ulid, date: NaiveDate) -> StoreResult<bool> {
        Ok(self.vacation_requests.remove(&(driver_id, date)).is_some())
    }

    async fn inoperative_period(&self, id: Ulid) -> StoreResult<Option<InoperativePeriod>> {
        Ok(self.inoperative_periods.get(&id).map(|e| e.value().clone()))
    }

    async fn active_inoperative_periods(&self) -> StoreResult<Vec<InoperativePeriod>> {
        Ok(self
            .inoperative_periods
            .iter()
            .filter(|e| e.value().status == PeriodStatus::Active)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn insert_inoperative_period(&self, period: InoperativePeriod) -> StoreResult<()> {
        self.inoperative_periods.insert(period.id, period);
        Ok(())
    }

    async fn complete_inoperative_period(&self, id: Ulid) -> StoreResult<bool> {
        // get_mut holds the shard lock, so the status check and the write
        // are one atomic step.
        match self.inoperative_periods.get_mut(&id) {
            Some(mut p) if p.status == PeriodStatus::Active => {
                p.status = PeriodStatus::Completed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn inspection_bookings(&self) -> StoreResult<Vec<InspectionBooking>> {
        Ok(self
            .inspection_bookings
            .iter()
            .map(|e| e.value().clone())
            .collect())
    }

    async fn insert_inspection_booking(&self, booking: InspectionBooking) -> StoreResult<()> {
        self.inspection_bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn delete_inspection_booking(&self, id: Ulid) -> StoreResult<Option<InspectionBooking>> {
        Ok(self.inspection_bookings.remove(&id).map(|(_, b)| b))
    }

    async fn temporary_assignments(&self) -> StoreResult<Vec<TemporaryAssignment>> {
        Ok(self
            .temporary_assignments
            .iter()
            .map(|e| e.value().clone())
            .collect())
    }

    async fn insert_temporary_assignment(&self, assignment: TemporaryAssignment) -> StoreResult<()> {
        self.temporary_assignments.insert(assignment.id, assignment);
        Ok(())
    }

    async fn take_temporary_assignment(&self, id: Ulid) -> StoreResult<Option<TemporaryAssignment>> {
        Ok(self.temporary_assignments.remove(&id).map(|(_, a)| a))
    }

    async fn assignment_changes_in(&self, range: DayRange) -> StoreResult<Vec<AssignmentChange>> {
        Ok(self
            .assignment_changes
            .iter()
            .filter(|e| range.contains(e.value().date))
            .map(|e| e.value().clone())
            .collect())
    }

    async fn insert_assignment_change(&self, change: AssignmentChange) -> StoreResult<()> {
        self.assignment_changes.insert(change.id, change);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn period(vehicle_id: Ulid, start: NaiveDate, end: NaiveDate) -> InoperativePeriod {
        InoperativePeriod {
            id: Ulid::new(),
            vehicle_id,
            range: DayRange::new(start, end),
            kind: InoperativeKind::Repair,
            reason: "gearbox".into(),
            original_driver: None,
            status: PeriodStatus::Active,
        }
    }

    #[tokio::test]
    async fn vacation_upsert_supersedes_by_natural_key() {
        let store = MemoryStore::new();
        let driver_id = Ulid::new();
        let date = d(2025, 6, 16);

        let first = VacationRequest {
            id: Ulid::new(),
            driver_id,
            date,
            work_status: WorkStatus::DayOff,
            team: "A".into(),
            external: false,
        };
        let second = VacationRequest {
            id: Ulid::new(), // different surrogate id, same natural key
            work_status: WorkStatus::Working,
            ..first.clone()
        };

        store.upsert_vacation_request(first).await.unwrap();
        store.upsert_vacation_request(second.clone()).await.unwrap();

        let stored = store
            .vacation_requests_in(DayRange::day(date))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], second);
    }

    #[tokio::test]
    async fn complete_period_is_conditional() {
        let store = MemoryStore::new();
        let p = period(Ulid::new(), d(2025, 6, 1), d(2025, 6, 3));
        let id = p.id;
        store.insert_inoperative_period(p).await.unwrap();

        assert!(store.complete_inoperative_period(id).await.unwrap());
        // Second attempt finds it already completed.
        assert!(!store.complete_inoperative_period(id).await.unwrap());
        // Unknown id is a no-op, not an error.
        assert!(!store.complete_inoperative_period(Ulid::new()).await.unwrap());
    }

    #[tokio::test]
    async fn take_assignment_returns_once() {
        let store = MemoryStore::new();
        let a = TemporaryAssignment {
            id: Ulid::new(),
            driver_id: Ulid::new(),
            driver_name: "Tanaka".into(),
            vehicle_id: Ulid::new(),
            range: DayRange::new(d(2025, 6, 1), d(2025, 6, 5)),
            original_driver: Some("Suzuki".into()),
        };
        let id = a.id;
        store.insert_temporary_assignment(a).await.unwrap();

        assert!(store.take_temporary_assignment(id).await.unwrap().is_some());
        assert!(store.take_temporary_assignment(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn active_periods_excludes_completed() {
        let store = MemoryStore::new();
        let keep = period(Ulid::new(), d(2025, 6, 1), d(2025, 6, 3));
        let done = period(Ulid::new(), d(2025, 5, 1), d(2025, 5, 3));
        let done_id = done.id;
        store.insert_inoperative_period(keep.clone()).await.unwrap();
        store.insert_inoperative_period(done).await.unwrap();
        store.complete_inoperative_period(done_id).await.unwrap();

        let active = store.active_inoperative_periods().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, keep.id);
    }

    #[tokio::test]
    async fn range_filters_by_date() {
        let store = MemoryStore::new();
        let change = AssignmentChange {
            id: Ulid::new(),
            vehicle_id: Ulid::new(),
            date: d(2025, 7, 1),
            original_driver_id: None,
            original_driver_name: None,
            new_driver_id: Ulid::new(),
            new_driver_name: "Mori".into(),
            reason: "substitution".into(),
            temporary: true,
        };
        store.insert_assignment_change(change).await.unwrap();

        let june = DayRange::new(d(2025, 6, 1), d(2025, 6, 30));
        let july = DayRange::new(d(2025, 7, 1), d(2025, 7, 31));
        assert!(store.assignment_changes_in(june).await.unwrap().is_empty());
        assert_eq!(store.assignment_changes_in(july).await.unwrap().len(), 1);
    }
}
