use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::DayRange;

const CHANNEL_CAPACITY: usize = 256;

/// Human-readable notification emitted when a schedule-affecting record is
/// created or cancelled. Delivery is somebody else's job; the engine only
/// broadcasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    InoperativePeriodOpened {
        vehicle_id: Ulid,
        plate_no: String,
        range: DayRange,
        kind: &'static str,
        reason: String,
    },
    InoperativePeriodClosed {
        vehicle_id: Ulid,
        plate_no: String,
    },
    InspectionBooked {
        vehicle_id: Ulid,
        plate_no: String,
        range: DayRange,
        deadline: NaiveDate,
    },
    InspectionCancelled {
        vehicle_id: Ulid,
        plate_no: String,
    },
    VehicleReassigned {
        vehicle_id: Ulid,
        plate_no: String,
        date: NaiveDate,
        driver: String,
    },
    TemporaryAssignmentStarted {
        vehicle_id: Ulid,
        plate_no: String,
        range: DayRange,
        driver: String,
    },
    AssignmentRestored {
        vehicle_id: Ulid,
        plate_no: String,
        driver: Option<String>,
    },
}

impl Notice {
    pub fn vehicle_id(&self) -> Ulid {
        match self {
            Notice::InoperativePeriodOpened { vehicle_id, .. }
            | Notice::InoperativePeriodClosed { vehicle_id, .. }
            | Notice::InspectionBooked { vehicle_id, .. }
            | Notice::InspectionCancelled { vehicle_id, .. }
            | Notice::VehicleReassigned { vehicle_id, .. }
            | Notice::TemporaryAssignmentStarted { vehicle_id, .. }
            | Notice::AssignmentRestored { vehicle_id, .. } => *vehicle_id,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notice::InoperativePeriodOpened { plate_no, range, kind, reason, .. } => format!(
                "{plate_no} out of service {} to {} ({kind}: {reason})",
                range.start, range.end
            ),
            Notice::InoperativePeriodClosed { plate_no, .. } => {
                format!("{plate_no} back in service")
            }
            Notice::InspectionBooked { plate_no, range, deadline, .. } => format!(
                "{plate_no} inspection reserved {} to {} (deadline {deadline})",
                range.start, range.end
            ),
            Notice::InspectionCancelled { plate_no, .. } => {
                format!("{plate_no} inspection reservation cancelled")
            }
            Notice::VehicleReassigned { plate_no, date, driver, .. } => {
                format!("{plate_no} driven by {driver} on {date}")
            }
            Notice::TemporaryAssignmentStarted { plate_no, range, driver, .. } => format!(
                "{plate_no} assigned to {driver} {} to {}",
                range.start, range.end
            ),
            Notice::AssignmentRestored { plate_no, driver, .. } => match driver {
                Some(name) => format!("{plate_no} returned to {name}"),
                None => format!("{plate_no} now unassigned"),
            },
        }
    }
}

/// Broadcast hub, one channel per vehicle.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Notice>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notices for a vehicle. Creates the channel if needed.
    pub fn subscribe(&self, vehicle_id: Ulid) -> broadcast::Receiver<Notice> {
        let sender = self
            .channels
            .entry(vehicle_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Best-effort send. No-op if nobody is listening; never fails the write
    /// that triggered it.
    pub fn send(&self, notice: &Notice) {
        if let Some(sender) = self.channels.get(&notice.vehicle_id()) {
            let _ = sender.send(notice.clone());
        }
    }

    /// Remove a channel (e.g. when a vehicle is deleted).
    pub fn remove(&self, vehicle_id: &Ulid) {
        self.channels.remove(vehicle_id);
    }
}
