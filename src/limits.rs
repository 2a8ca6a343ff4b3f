//! Operational limits. Every hard cap the engine enforces lives here so the
//! numbers are greppable and tests can reference them by name.

/// Longest accepted free-text reason (inoperative periods, reassignments).
pub const MAX_REASON_LEN: usize = 500;

/// Longest accepted name-ish field (driver names, plate numbers, memos).
pub const MAX_NAME_LEN: usize = 256;

/// Largest accepted bulk work-status batch.
pub const MAX_BATCH_SIZE: usize = 500;

/// Widest accepted date range on any record, in days.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Accepted year window for any record date.
pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;

/// Lead time a driver needs to create or cancel their own day-off request.
pub const SELF_SERVICE_LEAD_DAYS: i64 = 10;

/// Final fallback for the day-off quota cascade when settings are absent.
pub const DEFAULT_GLOBAL_DAY_OFF_LIMIT: u32 = 3;

/// Default sweep period. Must never exceed one day — records are day-granular
/// and an expired assignment must not outlive its end date by a full cycle.
pub const SWEEP_INTERVAL_SECS: u64 = 3600;

/// Hard ceiling for the configurable sweep period.
pub const MAX_SWEEP_INTERVAL_SECS: u64 = 86_400;
