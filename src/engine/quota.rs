use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::VacationRequest;
use crate::settings::VacationSettings;

use super::EngineError;

/// Current day-off headcount for (date, team). External drivers are excluded
/// unless the caller opts in; drivers in `superseded` are excluded because
/// the write under validation replaces their record.
pub fn existing_off_count(
    vacations: &[VacationRequest],
    date: NaiveDate,
    team: &str,
    include_external: bool,
    superseded: &HashSet<Ulid>,
) -> u32 {
    vacations
        .iter()
        .filter(|v| {
            v.date == date
                && v.team == team
                && v.is_off()
                && (include_external || !v.external)
                && !superseded.contains(&v.driver_id)
        })
        .count() as u32
}

/// The single quota gate both the self-service and the admin paths go
/// through. A limit of 0 forbids requests outright, before any counting.
pub fn check_quota(
    settings: &VacationSettings,
    date: NaiveDate,
    team: &str,
    existing: u32,
    requested: u32,
) -> Result<(), EngineError> {
    let limit = settings.limit_for(date, team);
    if limit == 0 {
        return Err(EngineError::QuotaExceeded {
            date,
            team: team.to_string(),
            limit: 0,
            existing: 0,
            requested,
        });
    }
    if existing + requested > limit {
        return Err(EngineError::QuotaExceeded {
            date,
            team: team.to_string(),
            limit,
            existing,
            requested,
        });
    }
    Ok(())
}

/// One candidate day-off in a bulk write, already resolved to its team.
#[derive(Debug, Clone)]
pub struct OffCandidate {
    pub driver_id: Ulid,
    pub date: NaiveDate,
    pub team: String,
}

/// Dry-run an entire bulk write before any record is written: group the
/// candidates by (date, team) and check every group against the cascade.
/// All-or-nothing — the first failing group rejects the whole batch.
pub fn validate_bulk(
    settings: &VacationSettings,
    candidates: &[OffCandidate],
    vacations: &[VacationRequest],
) -> Result<(), EngineError> {
    let mut groups: HashMap<(NaiveDate, &str), Vec<Ulid>> = HashMap::new();
    for c in candidates {
        groups
            .entry((c.date, c.team.as_str()))
            .or_default()
            .push(c.driver_id);
    }

    for ((date, team), drivers) in groups {
        let superseded: HashSet<Ulid> = drivers.iter().copied().collect();
        let existing = existing_off_count(vacations, date, team, false, &superseded);
        check_quota(settings, date, team, existing, superseded.len() as u32)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkStatus;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn off(team: &str, date: NaiveDate, external: bool) -> VacationRequest {
        VacationRequest {
            id: Ulid::new(),
            driver_id: Ulid::new(),
            date,
            work_status: WorkStatus::DayOff,
            team: team.into(),
            external,
        }
    }

    #[test]
    fn count_excludes_external_by_default() {
        let date = d(2025, 6, 16);
        let vacations = vec![off("A", date, false), off("A", date, true)];
        assert_eq!(
            existing_off_count(&vacations, date, "A", false, &HashSet::new()),
            1
        );
        assert_eq!(
            existing_off_count(&vacations, date, "A", true, &HashSet::new()),
            2
        );
    }

    #[test]
    fn count_excludes_superseded_driver() {
        let date = d(2025, 6, 16);
        let req = off("A", date, false);
        let superseded: HashSet<Ulid> = [req.driver_id].into();
        let vacations = vec![req, off("A", date, false)];
        assert_eq!(
            existing_off_count(&vacations, date, "A", false, &superseded),
            1
        );
    }

    #[test]
    fn count_ignores_other_teams_dates_and_statuses() {
        let date = d(2025, 6, 16);
        let mut working = off("A", date, false);
        working.work_status = WorkStatus::Working;
        let vacations = vec![
            off("B", date, false),
            off("A", d(2025, 6, 17), false),
            working,
        ];
        assert_eq!(
            existing_off_count(&vacations, date, "A", false, &HashSet::new()),
            0
        );
    }

    #[test]
    fn third_request_on_monday_limit_two_rejected() {
        let mut settings = VacationSettings::default();
        settings
            .team_monthly_weekday_limits
            .entry("A".into())
            .or_default()
            .entry(6)
            .or_default()
            .insert(1, 2); // June Mondays: 2

        let date = d(2025, 6, 16); // a June Monday
        let err = check_quota(&settings, date, "A", 2, 1).unwrap_err();
        assert!(matches!(
            err,
            EngineError::QuotaExceeded { limit: 2, existing: 2, requested: 1, .. }
        ));
        // Two existing is exactly at the limit — no more slots, but the
        // existing records stand.
        assert!(check_quota(&settings, date, "A", 1, 1).is_ok());
    }

    #[test]
    fn explicit_zero_rejects_before_counting() {
        let mut settings = VacationSettings::default();
        settings
            .specific_date_limits
            .entry(d(2025, 6, 16))
            .or_default()
            .insert("A".into(), 0);

        let err = check_quota(&settings, d(2025, 6, 16), "A", 0, 1).unwrap_err();
        assert!(matches!(
            err,
            EngineError::QuotaExceeded { limit: 0, existing: 0, .. }
        ));
    }

    #[test]
    fn bulk_validates_every_group() {
        let mut settings = VacationSettings::default();
        settings.max_drivers_off_per_day.insert("A".into(), 2);
        settings.max_drivers_off_per_day.insert("B".into(), 1);

        let date = d(2025, 6, 16);
        let candidates = vec![
            OffCandidate { driver_id: Ulid::new(), date, team: "A".into() },
            OffCandidate { driver_id: Ulid::new(), date, team: "A".into() },
            OffCandidate { driver_id: Ulid::new(), date, team: "B".into() },
            OffCandidate { driver_id: Ulid::new(), date, team: "B".into() },
        ];

        // Team A fits (2 <= 2); team B does not (2 > 1). Whole batch fails.
        let err = validate_bulk(&settings, &candidates, &[]).unwrap_err();
        assert!(matches!(err, EngineError::QuotaExceeded { ref team, .. } if team == "B"));

        // Dropping one B candidate makes the batch pass.
        let ok = validate_bulk(&settings, &candidates[..3], &[]);
        assert!(ok.is_ok());
    }

    #[test]
    fn bulk_rewrite_of_existing_off_does_not_double_count() {
        let mut settings = VacationSettings::default();
        settings.max_drivers_off_per_day.insert("A".into(), 1);

        let date = d(2025, 6, 16);
        let existing = off("A", date, false);
        let candidates = vec![OffCandidate {
            driver_id: existing.driver_id,
            date,
            team: "A".into(),
        }];

        // Re-writing the same driver's day off must not count them twice.
        assert!(validate_bulk(&settings, &candidates, &[existing]).is_ok());
    }
}
