//! Parameterized schedule generators. `applyTemplate` materializes a
//! `Schedule`; it never writes to the Schedule Store itself — the caller
//! (the REST boundary) decides whether to persist the result.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use freezegate_kernel::clock::Clock;
use freezegate_kernel::error::{ConfigError, ScheduleError};
use freezegate_kernel::model::{Schedule, Template};
use freezegate_kernel::store::ResourceStore;
use parking_lot::RwLock;
use serde::Deserialize;

const RECORD_NAME: &str = "templates";
const DATA_KEY: &str = "templates.yaml";

#[derive(Debug, Default, Deserialize)]
pub struct TemplateParameters {
    pub name: Option<String>,
    pub namespaces: Option<BTreeSet<String>>,
    pub message: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub cron: Option<String>,
    pub override_schedule: Option<Schedule>,
}

pub struct TemplateEngine {
    store: Arc<dyn ResourceStore>,
    clock: Arc<dyn Clock>,
    templates: RwLock<Vec<Template>>,
}

impl TemplateEngine {
    pub fn new(store: Arc<dyn ResourceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock, templates: RwLock::new(Vec::new()) }
    }

    pub async fn reload(&self) -> Result<(), ConfigError> {
        let record = self.store.read(RECORD_NAME).await?;
        let templates = match record.and_then(|r| r.data.get(DATA_KEY).cloned()) {
            Some(body) => serde_yaml::from_str(&body).map_err(|e| ConfigError::Malformed {
                record: RECORD_NAME.to_string(),
                reason: e.to_string(),
            })?,
            None => Vec::new(),
        };
        *self.templates.write() = templates;
        Ok(())
    }

    pub fn list(&self) -> Vec<Template> {
        self.templates.read().clone()
    }

    pub fn get(&self, name: &str) -> Option<Template> {
        self.templates.read().iter().find(|t| t.name == name).cloned()
    }

    pub fn apply(&self, name: &str, parameters: TemplateParameters) -> Result<Schedule, ScheduleError> {
        if let Some(schedule) = parameters.override_schedule {
            if !schedule.structurally_valid() {
                return Err(ScheduleError::InvalidRange { name: schedule.name.clone() });
            }
            crate::schedule::CronExpr::parse(&schedule.cron)?;
            return Ok(schedule);
        }

        let template = self.get(name).ok_or_else(|| ScheduleError::NotFound { name: name.to_string() })?;

        let start = parameters.start.unwrap_or_else(|| template.schedule.start.unwrap_or_else(|| self.clock.now()));
        let end = if let Some(end) = parameters.end {
            end
        } else if let Some(explicit_end) = template.schedule.end {
            explicit_end
        } else if let Some(hours) = template.schedule.duration_hours {
            start + Duration::hours(hours)
        } else if let Some(days) = template.schedule.duration_days {
            start + Duration::days(days)
        } else {
            return Err(ScheduleError::InvalidRange { name: template.name.clone() });
        };

        let cron = parameters.cron.unwrap_or_else(|| template.schedule.cron.clone());
        crate::schedule::CronExpr::parse(&cron)?;

        let schedule = Schedule {
            name: parameters.name.unwrap_or_else(|| template.name.clone()),
            start,
            end,
            cron,
            namespaces: parameters.namespaces.or(template.namespaces),
            message: parameters.message.or(template.message),
        };
        if !schedule.structurally_valid() {
            return Err(ScheduleError::InvalidRange { name: schedule.name });
        }
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::InMemoryResourceStore;
    use freezegate_kernel::clock::FixedClock;
    use freezegate_kernel::model::TemplateSchedule;

    fn setup_with_template() -> TemplateEngine {
        let store = Arc::new(InMemoryResourceStore::new());
        let now = DateTime::parse_from_rfc3339("2024-12-20T00:00:00Z").unwrap().with_timezone(&Utc);
        let clock = Arc::new(FixedClock::new(now));
        let engine = TemplateEngine::new(store, clock);
        *engine.templates.write() = vec![Template {
            name: "weekend-freeze".to_string(),
            description: "Weekend deployment freeze".to_string(),
            schedule: TemplateSchedule {
                cron: "0 0 * * 6".to_string(),
                start: None,
                end: None,
                duration_hours: Some(48),
                duration_days: None,
            },
            namespaces: None,
            message: Some("Weekend freeze in effect".to_string()),
        }];
        engine
    }

    #[test]
    fn applies_duration_hours_template() {
        let engine = setup_with_template();
        let schedule = engine.apply("weekend-freeze", TemplateParameters::default()).unwrap();
        assert_eq!(schedule.end - schedule.start, Duration::hours(48));
        assert_eq!(schedule.message.as_deref(), Some("Weekend freeze in effect"));
    }

    #[test]
    fn override_schedule_bypasses_template_rendering() {
        let engine = setup_with_template();
        let explicit = Schedule {
            name: "explicit".to_string(),
            start: Utc::now(),
            end: Utc::now() + Duration::hours(1),
            cron: "0 0 * * *".to_string(),
            namespaces: None,
            message: None,
        };
        let params = TemplateParameters { override_schedule: Some(explicit.clone()), ..Default::default() };
        let schedule = engine.apply("weekend-freeze", params).unwrap();
        assert_eq!(schedule, explicit);
    }

    #[test]
    fn parameters_override_name_and_namespaces() {
        let engine = setup_with_template();
        let mut namespaces = BTreeSet::new();
        namespaces.insert("prod".to_string());
        let params = TemplateParameters {
            name: Some("custom-name".to_string()),
            namespaces: Some(namespaces.clone()),
            ..Default::default()
        };
        let schedule = engine.apply("weekend-freeze", params).unwrap();
        assert_eq!(schedule.name, "custom-name");
        assert_eq!(schedule.namespaces, Some(namespaces));
    }

    #[test]
    fn unknown_template_errors() {
        let engine = setup_with_template();
        assert!(engine.apply("does-not-exist", TemplateParameters::default()).is_err());
    }
}
