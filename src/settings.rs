use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::limits::DEFAULT_GLOBAL_DAY_OFF_LIMIT;
use crate::model::weekday_index;

/// Process-wide vacation quota configuration. Loaded once, distributed by
/// `Arc`, replaced wholesale through [`SettingsHandle::update`].
///
/// Every layer stores explicit values only — an entry of `0` means "day-off
/// requests forbidden", which is different from the key being absent and the
/// cascade falling through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VacationSettings {
    /// Highest precedence: `date -> team -> limit`.
    pub specific_date_limits: HashMap<NaiveDate, HashMap<String, u32>>,
    /// `team -> month (1-12) -> weekday (0-6, Sunday=0) -> limit`.
    pub team_monthly_weekday_limits: HashMap<String, HashMap<u32, HashMap<u32, u32>>>,
    /// Legacy per-team fallback.
    pub max_drivers_off_per_day: HashMap<String, u32>,
    /// Final fallback.
    pub global_max_drivers_off_per_day: u32,
    pub minimum_off_days_per_month: u32,
}

impl Default for VacationSettings {
    fn default() -> Self {
        Self {
            specific_date_limits: HashMap::new(),
            team_monthly_weekday_limits: HashMap::new(),
            max_drivers_off_per_day: HashMap::new(),
            global_max_drivers_off_per_day: DEFAULT_GLOBAL_DAY_OFF_LIMIT,
            minimum_off_days_per_month: 0,
        }
    }
}

impl VacationSettings {
    /// Maximum simultaneous day-off count for (date, team).
    /// First matching layer wins; an explicit 0 wins like any other value.
    pub fn limit_for(&self, date: NaiveDate, team: &str) -> u32 {
        if let Some(by_team) = self.specific_date_limits.get(&date)
            && let Some(&limit) = by_team.get(team) {
                return limit;
            }
        if let Some(by_month) = self.team_monthly_weekday_limits.get(team)
            && let Some(by_weekday) = by_month.get(&date.month())
            && let Some(&limit) = by_weekday.get(&weekday_index(date)) {
                return limit;
            }
        if let Some(&limit) = self.max_drivers_off_per_day.get(team) {
            return limit;
        }
        self.global_max_drivers_off_per_day
    }
}

/// Shared, versioned settings. Readers take a cheap `Arc` snapshot and never
/// observe a half-applied update; writers go through the one `update` entry
/// point.
#[derive(Clone)]
pub struct SettingsHandle {
    inner: Arc<RwLock<Arc<VacationSettings>>>,
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(VacationSettings::default())
    }
}

impl SettingsHandle {
    pub fn new(settings: VacationSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(settings))),
        }
    }

    /// Current settings snapshot.
    pub fn load(&self) -> Arc<VacationSettings> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the settings wholesale.
    pub fn update(&self, settings: VacationSettings) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(settings);
    }
}
