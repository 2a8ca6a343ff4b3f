//! End-to-end exercise of the public surface: seed a fleet, let records
//! expire, run the sweep, and check the restored state the way a caller
//! observing the store would.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use fleetops::engine::Engine;
use fleetops::model::*;
use fleetops::notify::NotifyHub;
use fleetops::settings::{SettingsHandle, VacationSettings};
use fleetops::store::{MemoryStore, Store, StoreError, StoreResult};
use fleetops::sweep::{run_sweep, SweepReport};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn vehicle(plate: &str, driver: Option<&str>) -> Vehicle {
    Vehicle {
        id: Ulid::new(),
        plate_no: plate.into(),
        model: "Canter".into(),
        team: "A".into(),
        garage: "North".into(),
        driver: driver.map(Into::into),
        status: VehicleStatus::Normal,
        last_inspection: None,
        next_inspection: None,
        crane_inspection: None,
    }
}

fn driver(name: &str) -> Driver {
    Driver {
        id: Ulid::new(),
        name: name.into(),
        employee_no: "3001".into(),
        team: "A".into(),
        vehicle_id: None,
        night_shift: false,
        active: true,
    }
}

#[tokio::test]
async fn full_expiry_cycle() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(
        store.clone(),
        SettingsHandle::new(VacationSettings::default()),
        Arc::new(NotifyHub::new()),
    );

    // A vehicle in the shop over the weekend, and another covered by a
    // substitute while its driver is away.
    let shop = vehicle("T-100", Some("Sato"));
    let covered = vehicle("T-101", Some("Suzuki"));
    let (shop_id, covered_id) = (shop.id, covered.id);
    store.insert_vehicle(shop).await.unwrap();
    store.insert_vehicle(covered).await.unwrap();
    let substitute = driver("Tanaka");
    let substitute_id = substitute.id;
    store.insert_driver(substitute).await.unwrap();

    engine
        .open_inoperative_period(
            shop_id,
            d(2025, 6, 6),
            d(2025, 6, 8),
            InoperativeKind::Repair,
            "clutch".into(),
        )
        .await
        .unwrap();
    engine
        .start_temporary_assignment(
            substitute_id,
            covered_id,
            d(2025, 6, 2),
            d(2025, 6, 8),
            d(2025, 6, 2),
        )
        .await
        .unwrap();

    // While both windows are open: shop vehicle inactive, covered vehicle
    // runs with the substitute.
    let resolved = engine.resolve(shop_id, d(2025, 6, 7)).await.unwrap();
    assert_eq!(resolved.status, OperationStatus::InactiveRepair);
    let resolved = engine.resolve(covered_id, d(2025, 6, 7)).await.unwrap();
    assert_eq!(resolved.assigned_driver.as_deref(), Some("Tanaka"));
    assert_eq!(
        store.vehicle(covered_id).await.unwrap().unwrap().driver.as_deref(),
        Some("Tanaka")
    );

    // Both windows ended on the 8th; the next morning's sweep cleans up.
    let report = run_sweep(&engine, d(2025, 6, 9)).await;
    assert_eq!(
        report,
        SweepReport {
            periods_completed: 1,
            assignments_restored: 1,
            failures: 0
        }
    );

    let shop_vehicle = store.vehicle(shop_id).await.unwrap().unwrap();
    assert_eq!(shop_vehicle.status, VehicleStatus::Normal);
    let covered_vehicle = store.vehicle(covered_id).await.unwrap().unwrap();
    assert_eq!(covered_vehicle.driver.as_deref(), Some("Suzuki"));
    assert!(store.temporary_assignments().await.unwrap().is_empty());

    // Running the sweep again changes nothing.
    let again = run_sweep(&engine, d(2025, 6, 9)).await;
    assert_eq!(again, SweepReport::default());

    // And the resolver agrees the fleet is back in service.
    let resolved = engine.resolve(shop_id, d(2025, 6, 9)).await.unwrap();
    assert_eq!(resolved.status, OperationStatus::Active);
    let resolved = engine.resolve(covered_id, d(2025, 6, 9)).await.unwrap();
    assert_eq!(resolved.assigned_driver.as_deref(), Some("Suzuki"));
}

#[tokio::test]
async fn concurrent_sweeps_restore_once() {
    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(Engine::new(
        store.clone(),
        SettingsHandle::new(VacationSettings::default()),
        Arc::new(NotifyHub::new()),
    ));

    let v = vehicle("T-102", Some("Suzuki"));
    let vid = v.id;
    store.insert_vehicle(v).await.unwrap();
    let substitute = driver("Tanaka");
    let substitute_id = substitute.id;
    store.insert_driver(substitute).await.unwrap();

    engine
        .start_temporary_assignment(substitute_id, vid, d(2025, 6, 2), d(2025, 6, 8), d(2025, 6, 2))
        .await
        .unwrap();

    // Two sweeps racing over the same expired assignment: the conditional
    // take lets exactly one of them perform the restore.
    let (a, b) = tokio::join!(
        run_sweep(&engine, d(2025, 6, 9)),
        run_sweep(&engine, d(2025, 6, 9)),
    );
    assert_eq!(a.assignments_restored + b.assignments_restored, 1);
    assert_eq!(a.failures + b.failures, 0);
    assert_eq!(
        store.vehicle(vid).await.unwrap().unwrap().driver.as_deref(),
        Some("Suzuki")
    );
}

/// Store wrapper that refuses to complete one marked period, for exercising
/// the sweep's per-record failure isolation.
struct FailingStore {
    inner: MemoryStore,
    poison: Ulid,
}

#[async_trait]
impl Store for FailingStore {
    async fn vehicles(&self) -> StoreResult<Vec<Vehicle>> {
        self.inner.vehicles().await
    }
    async fn vehicle(&self, id: Ulid) -> StoreResult<Option<Vehicle>> {
        self.inner.vehicle(id).await
    }
    async fn insert_vehicle(&self, vehicle: Vehicle) -> StoreResult<()> {
        self.inner.insert_vehicle(vehicle).await
    }
    async fn set_vehicle_driver(&self, id: Ulid, driver: Option<String>) -> StoreResult<bool> {
        self.inner.set_vehicle_driver(id, driver).await
    }
    async fn set_vehicle_status(&self, id: Ulid, status: VehicleStatus) -> StoreResult<bool> {
        self.inner.set_vehicle_status(id, status).await
    }
    async fn drivers(&self) -> StoreResult<Vec<Driver>> {
        self.inner.drivers().await
    }
    async fn driver(&self, id: Ulid) -> StoreResult<Option<Driver>> {
        self.inner.driver(id).await
    }
    async fn insert_driver(&self, driver: Driver) -> StoreResult<()> {
        self.inner.insert_driver(driver).await
    }
    async fn vacation_requests_in(&self, range: DayRange) -> StoreResult<Vec<VacationRequest>> {
        self.inner.vacation_requests_in(range).await
    }
    async fn upsert_vacation_request(&self, request: VacationRequest) -> StoreResult<()> {
        self.inner.upsert_vacation_request(request).await
    }
    async fn delete_vacation_request(&self, driver_id: Ulid, date: NaiveDate) -> StoreResult<bool> {
        self.inner.delete_vacation_request(driver_id, date).await
    }
    async fn inoperative_period(&self, id: Ulid) -> StoreResult<Option<InoperativePeriod>> {
        self.inner.inoperative_period(id).await
    }
    async fn active_inoperative_periods(&self) -> StoreResult<Vec<InoperativePeriod>> {
        self.inner.active_inoperative_periods().await
    }
    async fn insert_inoperative_period(&self, period: InoperativePeriod) -> StoreResult<()> {
        self.inner.insert_inoperative_period(period).await
    }
    async fn complete_inoperative_period(&self, id: Ulid) -> StoreResult<bool> {
        if id == self.poison {
            return Err(StoreError("write timed out".into()));
        }
        self.inner.complete_inoperative_period(id).await
    }
    async fn inspection_bookings(&self) -> StoreResult<Vec<InspectionBooking>> {
        self.inner.inspection_bookings().await
    }
    async fn insert_inspection_booking(&self, booking: InspectionBooking) -> StoreResult<()> {
        self.inner.insert_inspection_booking(booking).await
    }
    async fn delete_inspection_booking(&self, id: Ulid) -> StoreResult<Option<InspectionBooking>> {
        self.inner.delete_inspection_booking(id).await
    }
    async fn temporary_assignments(&self) -> StoreResult<Vec<TemporaryAssignment>> {
        self.inner.temporary_assignments().await
    }
    async fn insert_temporary_assignment(&self, assignment: TemporaryAssignment) -> StoreResult<()> {
        self.inner.insert_temporary_assignment(assignment).await
    }
    async fn take_temporary_assignment(&self, id: Ulid) -> StoreResult<Option<TemporaryAssignment>> {
        self.inner.take_temporary_assignment(id).await
    }
    async fn assignment_changes_in(&self, range: DayRange) -> StoreResult<Vec<AssignmentChange>> {
        self.inner.assignment_changes_in(range).await
    }
    async fn insert_assignment_change(&self, change: AssignmentChange) -> StoreResult<()> {
        self.inner.insert_assignment_change(change).await
    }
}

#[tokio::test]
async fn one_failing_record_does_not_abort_the_sweep() {
    let inner = MemoryStore::new();
    let healthy = vehicle("T-103", None);
    let cursed = vehicle("T-104", None);
    let (healthy_id, cursed_id) = (healthy.id, cursed.id);
    inner.insert_vehicle(healthy).await.unwrap();
    inner.insert_vehicle(cursed).await.unwrap();

    let make_period = |vid: Ulid| InoperativePeriod {
        id: Ulid::new(),
        vehicle_id: vid,
        range: DayRange::new(d(2025, 6, 1), d(2025, 6, 3)),
        kind: InoperativeKind::Repair,
        reason: "worn brakes".into(),
        original_driver: None,
        status: PeriodStatus::Active,
    };
    let ok_period = make_period(healthy_id);
    let poisoned = make_period(cursed_id);
    let poison_id = poisoned.id;
    inner.insert_inoperative_period(ok_period).await.unwrap();
    inner.insert_inoperative_period(poisoned).await.unwrap();

    let store = Arc::new(FailingStore { inner, poison: poison_id });
    let engine = Engine::new(
        store.clone(),
        SettingsHandle::new(VacationSettings::default()),
        Arc::new(NotifyHub::new()),
    );

    let report = run_sweep(&engine, d(2025, 6, 10)).await;
    assert_eq!(report.failures, 1);
    // The healthy record still transitioned.
    assert_eq!(report.periods_completed, 1);
    assert_eq!(
        store.vehicle(healthy_id).await.unwrap().unwrap().status,
        VehicleStatus::Normal
    );

    // The poisoned record is untouched and will be retried next pass.
    let remaining = store.active_inoperative_periods().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, poison_id);
}
