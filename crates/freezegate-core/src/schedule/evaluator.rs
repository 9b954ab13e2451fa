//! The cron-plus-window calculus: given schedules, the current instant, and
//! a namespace, decide whether any schedule is "active".

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use freezegate_kernel::model::{Policy, Schedule};

use super::cron_expr::CronExpr;

fn end_of_utc_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.date_naive()
        .and_time(NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap())
        .and_utc()
}

/// Is `schedule` active at instant `t`, ignoring namespace scope?
/// Implements the cover-window rule (§4.E condition 3).
fn cron_covers(cron: &CronExpr, start: DateTime<Utc>, end: DateTime<Utc>, t: DateTime<Utc>) -> bool {
    if t < start || t > end {
        return false;
    }
    let prev = match cron.prev_at_or_before(t) {
        Some(p) => p,
        None => return false,
    };
    let effective_prev = if prev < start {
        match cron.at_or_after(start) {
            Some(p) if p <= t && p <= end => p,
            _ => return false,
        }
    } else {
        prev
    };
    let cover_end = end_of_utc_day(effective_prev).min(end);
    effective_prev <= t && t <= cover_end
}

fn namespace_in_scope(schedule: &Schedule, namespace: Option<&str>, exempt_namespaces: &BTreeSet<String>) -> bool {
    let ns = match namespace {
        Some(ns) => ns,
        None => return true,
    };
    match &schedule.namespaces {
        Some(set) if !set.is_empty() => set.contains(ns),
        _ => !exempt_namespaces.contains(ns),
    }
}

/// Is `schedule` active at instant `t` for namespace `ns`?
pub fn schedule_active(
    schedule: &Schedule,
    t: DateTime<Utc>,
    namespace: Option<&str>,
    exempt_namespaces: &BTreeSet<String>,
) -> bool {
    if !namespace_in_scope(schedule, namespace, exempt_namespaces) {
        return false;
    }
    let cron = match CronExpr::parse(&schedule.cron) {
        Ok(c) => c,
        Err(_) => return false,
    };
    cron_covers(&cron, schedule.start, schedule.end, t)
}

/// All schedules active at `t` for `namespace`.
pub fn active_schedules<'a>(
    schedules: &'a [Schedule],
    t: DateTime<Utc>,
    namespace: Option<&str>,
    exempt_namespaces: &BTreeSet<String>,
) -> Vec<&'a Schedule> {
    schedules
        .iter()
        .filter(|s| schedule_active(s, t, namespace, exempt_namespaces))
        .collect()
}

/// The name of the first active schedule, or the fallback to the simple
/// manual-freeze check.
pub fn is_freeze_active(policy: &Policy, t: DateTime<Utc>, namespace: Option<&str>) -> (bool, Option<String>) {
    let active = active_schedules(&policy.freeze_schedule, t, namespace, &policy.bypass_exempt_namespaces);
    if let Some(schedule) = active.first() {
        return (true, Some(schedule.name.clone()));
    }
    let manual = policy.freeze_enabled && policy.freeze_until.map(|until| t < until).unwrap_or(true);
    if manual {
        (true, Some("Manual Freeze".to_string()))
    } else {
        (false, None)
    }
}

pub fn cover_window_end(schedule: &Schedule, matched_at: DateTime<Utc>) -> DateTime<Utc> {
    end_of_utc_day(matched_at).min(schedule.end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn sample_schedule() -> Schedule {
        Schedule {
            name: "holiday-freeze".to_string(),
            start: t("2024-12-24T00:00:00Z"),
            end: t("2024-12-27T00:00:00Z"),
            cron: "0 0 * * *".to_string(),
            namespaces: Some(BTreeSet::new()),
            message: None,
        }
    }

    #[test]
    fn active_mid_day_within_cover_window() {
        let s = sample_schedule();
        let mut exempt = BTreeSet::new();
        exempt.insert("staging".to_string());
        assert!(schedule_active(&s, t("2024-12-25T10:30:00Z"), Some("prod"), &exempt));
        assert!(!schedule_active(&s, t("2024-12-25T10:30:00Z"), Some("staging"), &exempt));
    }

    #[test]
    fn active_exactly_at_start_inactive_one_microsecond_before() {
        let s = sample_schedule();
        let exempt = BTreeSet::new();
        assert!(schedule_active(&s, s.start, Some("prod"), &exempt));
        assert!(!schedule_active(&s, s.start - Duration::microseconds(1), Some("prod"), &exempt));
    }

    #[test]
    fn active_exactly_at_end_inactive_after() {
        let s = sample_schedule();
        let exempt = BTreeSet::new();
        assert!(schedule_active(&s, s.end, Some("prod"), &exempt));
        assert!(!schedule_active(&s, s.end + Duration::microseconds(1), Some("prod"), &exempt));
    }

    #[test]
    fn midnight_cron_covers_whole_day_even_when_end_truncates() {
        let mut s = sample_schedule();
        s.end = t("2024-12-25T06:00:00Z");
        let exempt = BTreeSet::new();
        assert!(schedule_active(&s, t("2024-12-25T05:59:00Z"), Some("prod"), &exempt));
        assert!(!schedule_active(&s, t("2024-12-25T06:00:01Z"), Some("prod"), &exempt));
    }

    #[test]
    fn evening_cron_covers_until_midnight_clipped_by_end() {
        let s = Schedule {
            name: "nightly-freeze".to_string(),
            start: t("2024-12-24T00:00:00Z"),
            end: t("2024-12-27T00:00:00Z"),
            cron: "0 22 * * *".to_string(),
            namespaces: None,
            message: None,
        };
        let exempt = BTreeSet::new();
        assert!(schedule_active(&s, t("2024-12-24T23:59:00Z"), Some("prod"), &exempt));
        assert!(!schedule_active(&s, t("2024-12-25T00:00:01Z"), Some("prod"), &exempt));
        assert!(schedule_active(&s, t("2024-12-24T22:00:00Z"), Some("prod"), &exempt));
        assert!(!schedule_active(&s, t("2024-12-24T21:59:00Z"), Some("prod"), &exempt));
    }

    #[test]
    fn empty_namespaces_in_exempt_set_is_inactive() {
        let mut s = sample_schedule();
        s.namespaces = Some(BTreeSet::new());
        let mut exempt = BTreeSet::new();
        exempt.insert("staging".to_string());
        assert!(!schedule_active(&s, t("2024-12-25T10:30:00Z"), Some("staging"), &exempt));
    }

    #[test]
    fn manual_freeze_fallback_when_no_schedule_active() {
        let mut policy = Policy::default();
        policy.freeze_enabled = true;
        policy.freeze_until = None;
        let (active, name) = is_freeze_active(&policy, t("2024-01-01T00:00:00Z"), Some("prod"));
        assert!(active);
        assert_eq!(name.as_deref(), Some("Manual Freeze"));
    }
}
