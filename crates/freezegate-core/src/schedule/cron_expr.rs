//! A minimal standard 5-field cron evaluator (minute hour dom month dow).
//!
//! The workspace's usual cron dependency only parses 6/7-field expressions
//! (seconds mandatory) and only walks forward. The cover-window algorithm
//! (see `evaluator.rs`) needs the *previous* match at-or-before an instant,
//! which a forward-only API can only answer by stepping minute-by-minute —
//! unacceptable on the admission hot path. This module instead walks each
//! field from the largest unit down, jumping straight to the next/previous
//! allowed value rather than scanning every minute.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use freezegate_kernel::error::ScheduleError;

const MAX_CARRY_STEPS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    raw: String,
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    doms: BTreeSet<u32>,
    months: BTreeSet<u32>,
    dows: BTreeSet<u32>,
    dom_is_star: bool,
    dow_is_star: bool,
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScheduleError::InvalidCron {
                expr: expr.to_string(),
                reason: format!("expected 5 fields, got {}", fields.len()),
            });
        }
        let minutes = parse_field(expr, fields[0], 0, 59)?;
        let hours = parse_field(expr, fields[1], 0, 23)?;
        let doms = parse_field(expr, fields[2], 1, 31)?;
        let months = parse_field(expr, fields[3], 1, 12)?;
        let mut dows = parse_field(expr, fields[4], 0, 7)?;
        if dows.remove(&7) {
            dows.insert(0);
        }
        Ok(Self {
            raw: expr.to_string(),
            minutes,
            hours,
            doms,
            months,
            dows,
            dom_is_star: fields[2].trim() == "*",
            dow_is_star: fields[4].trim() == "*",
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom_match = self.doms.contains(&date.day());
        let dow_match = self.dows.contains(&date.weekday().num_days_from_sunday());
        match (self.dom_is_star, self.dow_is_star) {
            (true, true) => true,
            (true, false) => dow_match,
            (false, true) => dom_match,
            (false, false) => dom_match || dow_match,
        }
    }

    fn matches(&self, dt: DateTime<Utc>) -> bool {
        self.months.contains(&dt.month())
            && self.day_matches(dt.date_naive())
            && self.hours.contains(&dt.hour())
            && self.minutes.contains(&dt.minute())
    }

    /// The least cron-match strictly greater than `t`.
    pub fn next_after(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut dt = truncate_to_minute(t) + Duration::minutes(1);
        for _ in 0..MAX_CARRY_STEPS {
            if !self.months.contains(&dt.month()) {
                dt = start_of_next_month(dt);
                continue;
            }
            if !self.day_matches(dt.date_naive()) {
                dt = start_of_next_day(dt);
                continue;
            }
            if !self.hours.contains(&dt.hour()) {
                dt = match next_ge(&self.hours, dt.hour()) {
                    Some(h) if h == dt.hour() => dt,
                    Some(h) => at_hour_minute(dt, h, 0),
                    None => start_of_next_day(dt),
                };
                continue;
            }
            if !self.minutes.contains(&dt.minute()) {
                dt = match next_ge(&self.minutes, dt.minute()) {
                    Some(m) if m == dt.minute() => dt,
                    Some(m) => at_hour_minute(dt, dt.hour(), m),
                    None => start_of_next_hour(dt),
                };
                continue;
            }
            return Some(dt);
        }
        None
    }

    /// The least cron-match greater than or equal to `t`.
    pub fn at_or_after(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let t = truncate_to_minute(t);
        if self.matches(t) {
            Some(t)
        } else {
            self.next_after(t)
        }
    }

    /// The greatest cron-match less than or equal to `t`.
    pub fn prev_at_or_before(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut dt = truncate_to_minute(t);
        for _ in 0..MAX_CARRY_STEPS {
            if !self.months.contains(&dt.month()) {
                dt = end_of_prev_month(dt);
                continue;
            }
            if !self.day_matches(dt.date_naive()) {
                dt = end_of_prev_day(dt);
                continue;
            }
            if !self.hours.contains(&dt.hour()) {
                dt = match prev_le(&self.hours, dt.hour()) {
                    Some(h) if h == dt.hour() => dt,
                    Some(h) => at_hour_minute(dt, h, 59),
                    None => end_of_prev_day(dt),
                };
                continue;
            }
            if !self.minutes.contains(&dt.minute()) {
                dt = match prev_le(&self.minutes, dt.minute()) {
                    Some(m) if m == dt.minute() => dt,
                    Some(m) => at_hour_minute(dt, dt.hour(), m),
                    None => end_of_prev_hour(dt),
                };
                continue;
            }
            return Some(dt);
        }
        None
    }
}

fn truncate_to_minute(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_second(0).unwrap().with_nanosecond(0).unwrap()
}

fn at_hour_minute(dt: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    dt.with_hour(hour).unwrap().with_minute(minute).unwrap().with_second(0).unwrap()
}

fn start_of_next_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    let next = dt.date_naive().succ_opt().unwrap_or(dt.date_naive());
    Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0).unwrap())
}

fn end_of_prev_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    let prev = dt.date_naive().pred_opt().unwrap_or(dt.date_naive());
    Utc.from_utc_datetime(&prev.and_hms_opt(23, 59, 0).unwrap())
}

fn start_of_next_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
    if dt.hour() == 23 {
        start_of_next_day(dt)
    } else {
        at_hour_minute(dt, dt.hour() + 1, 0)
    }
}

fn end_of_prev_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
    if dt.hour() == 0 {
        end_of_prev_day(dt)
    } else {
        at_hour_minute(dt, dt.hour() - 1, 59)
    }
}

fn start_of_next_month(dt: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if dt.month() == 12 { (dt.year() + 1, 1) } else { (dt.year(), dt.month() + 1) };
    let date = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
}

fn end_of_prev_month(dt: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if dt.month() == 1 { (dt.year() - 1, 12) } else { (dt.year(), dt.month() - 1) };
    let days_in_month = days_in_month(year, month);
    let date = NaiveDate::from_ymd_opt(year, month, days_in_month).unwrap();
    Utc.from_utc_datetime(&date.and_hms_opt(23, 59, 0).unwrap())
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next_month_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).unwrap()
    };
    let this_month_first = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    (next_month_first - this_month_first).num_days() as u32
}

fn next_ge(set: &BTreeSet<u32>, value: u32) -> Option<u32> {
    set.range(value..).next().copied()
}

fn prev_le(set: &BTreeSet<u32>, value: u32) -> Option<u32> {
    set.range(..=value).next_back().copied()
}

fn parse_field(expr: &str, field: &str, min: u32, max: u32) -> Result<BTreeSet<u32>, ScheduleError> {
    let mut out = BTreeSet::new();
    for part in field.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (range_part, step) = match part.split_once('/') {
            Some((r, s)) => {
                let step: u32 = s.parse().map_err(|_| invalid(expr, format!("bad step '{s}'")))?;
                if step == 0 {
                    return Err(invalid(expr, "step of 0".to_string()));
                }
                (r, step)
            }
            None => (part, 1),
        };
        let (lo, hi) = if range_part == "*" {
            (min, max)
        } else if let Some((a, b)) = range_part.split_once('-') {
            let a: u32 = a.parse().map_err(|_| invalid(expr, format!("bad range start '{a}'")))?;
            let b: u32 = b.parse().map_err(|_| invalid(expr, format!("bad range end '{b}'")))?;
            (a, b)
        } else {
            let v: u32 = range_part.parse().map_err(|_| invalid(expr, format!("bad value '{range_part}'")))?;
            (v, v)
        };
        if lo < min || hi > max || lo > hi {
            return Err(invalid(expr, format!("value out of range {min}-{max}: '{part}'")));
        }
        let mut v = lo;
        while v <= hi {
            out.insert(v);
            v += step;
        }
    }
    if out.is_empty() {
        return Err(invalid(expr, format!("field '{field}' produced no values")));
    }
    Ok(out)
}

fn invalid(expr: &str, reason: String) -> ScheduleError {
    ScheduleError::InvalidCron { expr: expr.to_string(), reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn parses_star_as_full_range() {
        let expr = CronExpr::parse("* * * * *").unwrap();
        assert_eq!(expr.minutes.len(), 60);
        assert_eq!(expr.hours.len(), 24);
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(CronExpr::parse("* * * *").is_err());
    }

    #[test]
    fn daily_midnight_next_and_prev() {
        let expr = CronExpr::parse("0 0 * * *").unwrap();
        let now = t("2024-12-25T10:30:00Z");
        assert_eq!(expr.prev_at_or_before(now), Some(t("2024-12-25T00:00:00Z")));
        assert_eq!(expr.next_after(now), Some(t("2024-12-26T00:00:00Z")));
    }

    #[test]
    fn exact_match_is_its_own_prev() {
        let expr = CronExpr::parse("0 22 * * *").unwrap();
        let now = t("2024-12-25T22:00:00Z");
        assert_eq!(expr.prev_at_or_before(now), Some(now));
    }

    #[test]
    fn step_expression() {
        let expr = CronExpr::parse("*/15 * * * *").unwrap();
        let now = t("2024-12-25T10:07:00Z");
        assert_eq!(expr.prev_at_or_before(now), Some(t("2024-12-25T10:00:00Z")));
        assert_eq!(expr.next_after(now), Some(t("2024-12-25T10:15:00Z")));
    }

    #[test]
    fn dom_or_dow_when_both_restricted() {
        // Fires on the 1st of the month OR every Monday.
        let expr = CronExpr::parse("0 9 1 * 1").unwrap();
        // 2024-12-02 is a Monday, not the 1st.
        let monday = t("2024-12-02T09:00:00Z");
        assert_eq!(expr.prev_at_or_before(monday), Some(monday));
    }
}
