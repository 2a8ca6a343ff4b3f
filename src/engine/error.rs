use chrono::NaiveDate;
use ulid::Ulid;

use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// Malformed input rejected before any write.
    Validation(String),
    /// Day-off quota would be exceeded. Carries the computed limit and the
    /// current count so callers can display both.
    QuotaExceeded {
        date: NaiveDate,
        team: String,
        limit: u32,
        existing: u32,
        requested: u32,
    },
    /// Referenced record no longer exists (read/write race).
    NotFound(Ulid),
    /// The external store failed the write.
    Persistence(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(reason) => write!(f, "validation failed: {reason}"),
            EngineError::QuotaExceeded {
                date,
                team,
                limit,
                existing,
                requested,
            } => write!(
                f,
                "day-off quota exceeded for team {team} on {date}: limit {limit}, {existing} existing, {requested} requested"
            ),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::Persistence(e) => write!(f, "persistence error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Persistence(e.0)
    }
}
