mod calendar;
mod error;
mod mutations;
mod quota;
mod roster;
mod status;

pub use calendar::{month_grid, month_view, BookingConflict, BookingIndex, DaySummary};
pub use error::EngineError;
pub use quota::{check_quota, existing_off_count, validate_bulk, OffCandidate};
pub use roster::{
    available_drivers_for, uncovered_vehicles_for, UncoveredReason, UncoveredVehicle,
};
pub use status::{resolve, ResolveContext};

use std::sync::Arc;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::settings::{SettingsHandle, VacationSettings};
use crate::store::Store;

/// The scheduling engine: a thin stateful shell around the pure resolvers.
/// It assembles entity snapshots from the external store, runs the resolver
/// functions over them, and owns every write path that touches the store.
pub struct Engine {
    store: Arc<dyn Store>,
    settings: SettingsHandle,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, settings: SettingsHandle, notify: Arc<NotifyHub>) -> Self {
        Self {
            store,
            settings,
            notify,
        }
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Current settings snapshot (cheap Arc clone).
    pub fn current_settings(&self) -> Arc<VacationSettings> {
        self.settings.load()
    }

    /// The one entry point for replacing quota settings.
    pub fn update_settings(&self, settings: VacationSettings) {
        self.settings.update(settings);
    }

    pub fn limit_for(&self, date: NaiveDate, team: &str) -> u32 {
        self.settings.load().limit_for(date, team)
    }

    /// Assemble an immutable snapshot of every schedule-affecting record
    /// touching `range`. The resolvers run over this without further store
    /// access.
    pub async fn snapshot(&self, range: DayRange) -> Result<ResolveContext, EngineError> {
        let drivers = self.store.drivers().await?;
        let periods = self.store.active_inoperative_periods().await?;
        let bookings = BookingIndex::build(&self.store.inspection_bookings().await?);
        let assignments = self.store.temporary_assignments().await?;
        let changes = self.store.assignment_changes_in(range).await?;
        let vacations = self.store.vacation_requests_in(range).await?;
        Ok(ResolveContext::new(
            drivers,
            periods,
            bookings,
            assignments,
            changes,
            vacations,
        ))
    }

    /// Resolve the operational status of one vehicle on one date.
    pub async fn resolve(
        &self,
        vehicle_id: Ulid,
        date: NaiveDate,
    ) -> Result<VehicleOperationStatus, EngineError> {
        let vehicle = self
            .store
            .vehicle(vehicle_id)
            .await?
            .ok_or(EngineError::NotFound(vehicle_id))?;
        let ctx = self.snapshot(DayRange::day(date)).await?;
        let resolved = status::resolve(&vehicle, date, &ctx);
        metrics::counter!(
            crate::observability::RESOLVE_TOTAL,
            "status" => crate::observability::status_label(resolved.status)
        )
        .increment(1);
        Ok(resolved)
    }

    pub async fn uncovered_vehicles_for(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<UncoveredVehicle>, EngineError> {
        let vehicles = self.store.vehicles().await?;
        let ctx = self.snapshot(DayRange::day(date)).await?;
        Ok(roster::uncovered_vehicles_for(&vehicles, date, &ctx))
    }

    pub async fn available_drivers_for(
        &self,
        date: NaiveDate,
        period: DayRange,
    ) -> Result<Vec<Driver>, EngineError> {
        let ctx = self.snapshot(period).await?;
        Ok(roster::available_drivers_for(date, &period, &ctx))
    }

    /// Per-day counts for the displayed month grid.
    pub async fn month_view(&self, year: i32, month: u32) -> Result<Vec<DaySummary>, EngineError> {
        let grid = calendar::month_grid(year, month)?;
        let (Some(first), Some(last)) = (grid.first(), grid.last()) else {
            return Ok(Vec::new());
        };
        let vehicles = self.store.vehicles().await?;
        let ctx = self.snapshot(DayRange::new(*first, *last)).await?;
        calendar::month_view(year, month, &vehicles, &ctx)
    }
}
