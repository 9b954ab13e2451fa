use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Monotonic "now" in UTC, injectable so that schedule-boundary tests don't
/// race the wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests that need to sit exactly on a cover-window
/// boundary.
#[derive(Debug)]
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Mutex::new(at))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock().expect("fixed clock poisoned") = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("fixed clock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_what_it_was_set_to() {
        let t = DateTime::parse_from_rfc3339("2024-12-25T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let clock = FixedClock::new(t);
        assert_eq!(clock.now(), t);
        let t2 = t + chrono::Duration::hours(1);
        clock.set(t2);
        assert_eq!(clock.now(), t2);
    }
}
