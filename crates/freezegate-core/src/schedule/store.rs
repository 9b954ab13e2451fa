use std::sync::Arc;

use freezegate_kernel::error::ScheduleError;
use freezegate_kernel::model::Schedule;
use freezegate_kernel::store::{ResourceRecord, ResourceStore};
use parking_lot::RwLock;

const RECORD_NAME: &str = "schedules";
const DATA_KEY: &str = "schedules.yaml";

/// CRUD over the persisted schedule list. A single `RwLock<Vec<Schedule>>`
/// cache, written through to the store on every mutation before the lock is
/// released (§5 shared-resource policy).
pub struct ScheduleStore {
    store: Arc<dyn ResourceStore>,
    record_name: String,
    cache: RwLock<Vec<Schedule>>,
}

impl ScheduleStore {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self::with_record_name(store, RECORD_NAME)
    }

    pub fn with_record_name(store: Arc<dyn ResourceStore>, record_name: impl Into<String>) -> Self {
        Self { store, record_name: record_name.into(), cache: RwLock::new(Vec::new()) }
    }

    pub async fn load(&self) -> Result<(), ScheduleError> {
        let loaded = self.read_from_store().await?;
        *self.cache.write() = loaded;
        Ok(())
    }

    async fn read_from_store(&self) -> Result<Vec<Schedule>, ScheduleError> {
        let record = self.store.read(&self.record_name).await?;
        let body = match record.and_then(|r| r.data.get(DATA_KEY).cloned()) {
            Some(b) => b,
            None => return Ok(Vec::new()),
        };
        let schedules: Vec<Schedule> = serde_yaml::from_str(&body).map_err(|e| ScheduleError::InvalidCron {
            expr: String::new(),
            reason: format!("malformed schedules record: {e}"),
        })?;
        Ok(schedules)
    }

    async fn persist(&self, schedules: &[Schedule]) -> Result<(), ScheduleError> {
        let body = serde_yaml::to_string(schedules).expect("schedule list always serializes");
        self.store
            .patch(&self.record_name, ResourceRecord::single(DATA_KEY, body))
            .await?;
        Ok(())
    }

    pub fn list(&self) -> Vec<Schedule> {
        self.cache.read().clone()
    }

    pub fn get(&self, name: &str) -> Option<Schedule> {
        self.cache.read().iter().find(|s| s.name == name).cloned()
    }

    pub async fn add(&self, schedule: Schedule) -> Result<(), ScheduleError> {
        if !schedule.structurally_valid() {
            return Err(ScheduleError::InvalidRange { name: schedule.name.clone() });
        }
        crate::schedule::cron_expr::CronExpr::parse(&schedule.cron)?;
        let snapshot = {
            let mut guard = self.cache.write();
            if guard.iter().any(|s| s.name == schedule.name) {
                return Err(ScheduleError::AlreadyExists { name: schedule.name });
            }
            guard.push(schedule);
            guard.clone()
        };
        self.persist(&snapshot).await
    }

    pub async fn remove(&self, name: &str) -> Result<(), ScheduleError> {
        let snapshot = {
            let mut guard = self.cache.write();
            let before = guard.len();
            guard.retain(|s| s.name != name);
            if guard.len() == before {
                return Err(ScheduleError::NotFound { name: name.to_string() });
            }
            guard.clone()
        };
        self.persist(&snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::InMemoryResourceStore;
    use chrono::{TimeZone, Utc};

    fn schedule(name: &str) -> Schedule {
        Schedule {
            name: name.to_string(),
            start: Utc.with_ymd_and_hms(2024, 12, 24, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 12, 27, 0, 0, 0).unwrap(),
            cron: "0 0 * * *".to_string(),
            namespaces: None,
            message: None,
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let backing = Arc::new(InMemoryResourceStore::new());
        let store = ScheduleStore::new(backing.clone());
        store.add(schedule("holiday")).await.unwrap();

        let reloaded = ScheduleStore::new(backing);
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.list(), store.list());
    }

    #[tokio::test]
    async fn add_then_remove_restores_original_list() {
        let backing = Arc::new(InMemoryResourceStore::new());
        let store = ScheduleStore::new(backing);
        let before = store.list();
        store.add(schedule("holiday")).await.unwrap();
        store.remove("holiday").await.unwrap();
        assert_eq!(store.list(), before);
    }

    #[tokio::test]
    async fn duplicate_name_rejected() {
        let backing = Arc::new(InMemoryResourceStore::new());
        let store = ScheduleStore::new(backing);
        store.add(schedule("holiday")).await.unwrap();
        assert!(store.add(schedule("holiday")).await.is_err());
    }
}
