use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use freezegate_kernel::clock::Clock;
use freezegate_kernel::error::ExemptionError;
use freezegate_kernel::model::Exemption;
use freezegate_kernel::store::{ResourceRecord, ResourceStore};
use parking_lot::RwLock;
use uuid::Uuid;

const RECORD_NAME: &str = "exemptions";
const DATA_KEY: &str = "exemptions.json";

pub struct NewExemption {
    pub namespace: String,
    pub resource_name: Option<String>,
    pub duration_minutes: i64,
    pub reason: String,
    pub approved_by: String,
}

/// CRUD + lookup + expiration sweep over temporary exemptions. One
/// `RwLock<Vec<Exemption>>` cache, written through before release.
pub struct ExemptionManager {
    store: Arc<dyn ResourceStore>,
    clock: Arc<dyn Clock>,
    record_name: String,
    cache: RwLock<Vec<Exemption>>,
}

impl ExemptionManager {
    pub fn new(store: Arc<dyn ResourceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock, record_name: RECORD_NAME.to_string(), cache: RwLock::new(Vec::new()) }
    }

    pub async fn load(&self) -> Result<(), ExemptionError> {
        let record = self.store.read(&self.record_name).await?;
        let loaded = match record.and_then(|r| r.data.get(DATA_KEY).cloned()) {
            Some(body) => {
                let by_id: std::collections::HashMap<String, Exemption> =
                    serde_json::from_str(&body).unwrap_or_default();
                by_id.into_values().collect()
            }
            None => Vec::new(),
        };
        *self.cache.write() = loaded;
        Ok(())
    }

    async fn persist(&self, exemptions: &[Exemption]) -> Result<(), ExemptionError> {
        let by_id: std::collections::HashMap<String, &Exemption> =
            exemptions.iter().map(|e| (e.id.to_string(), e)).collect();
        let body = serde_json::to_string(&by_id).expect("exemption map always serializes");
        self.store.patch(&self.record_name, ResourceRecord::single(DATA_KEY, body)).await?;
        Ok(())
    }

    pub async fn create(&self, new: NewExemption) -> Result<Exemption, ExemptionError> {
        let created_at = self.clock.now();
        let exemption = Exemption {
            id: Uuid::new_v4(),
            namespace: new.namespace,
            resource_name: new.resource_name,
            duration_minutes: new.duration_minutes,
            reason: new.reason,
            approved_by: new.approved_by,
            created_at,
            expires_at: created_at + Duration::minutes(new.duration_minutes),
            used: false,
        };
        let snapshot = {
            let mut guard = self.cache.write();
            guard.push(exemption.clone());
            guard.clone()
        };
        self.persist(&snapshot).await?;
        Ok(exemption)
    }

    pub fn get(&self, id: Uuid) -> Option<Exemption> {
        self.cache.read().iter().find(|e| e.id == id).cloned()
    }

    pub fn list(&self, namespace: Option<&str>, active_only: bool) -> Vec<Exemption> {
        let now = self.clock.now();
        self.cache
            .read()
            .iter()
            .filter(|e| namespace.is_none_or(|ns| e.namespace == ns))
            .filter(|e| !active_only || e.is_valid(now))
            .cloned()
            .collect()
    }

    /// First match among active exemptions for `namespace`, preferring the
    /// nearest expiry. A resource-specific exemption matches only that
    /// resource; a namespace-wide exemption (no `resourceName`) matches any.
    pub fn check(&self, namespace: &str, resource_name: Option<&str>) -> Option<Exemption> {
        let now = self.clock.now();
        let mut candidates: Vec<Exemption> = self
            .cache
            .read()
            .iter()
            .filter(|e| e.is_valid(now))
            .filter(|e| e.matches(namespace, resource_name))
            .cloned()
            .collect();
        candidates.sort_by_key(|e| e.expires_at);
        candidates.into_iter().next()
    }

    pub async fn mark_used(&self, id: Uuid) -> Result<(), ExemptionError> {
        let snapshot = {
            let mut guard = self.cache.write();
            let exemption =
                guard.iter_mut().find(|e| e.id == id).ok_or_else(|| ExemptionError::NotFound { id: id.to_string() })?;
            exemption.used = true;
            guard.clone()
        };
        self.persist(&snapshot).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ExemptionError> {
        let snapshot = {
            let mut guard = self.cache.write();
            let before = guard.len();
            guard.retain(|e| e.id != id);
            if guard.len() == before {
                return Err(ExemptionError::NotFound { id: id.to_string() });
            }
            guard.clone()
        };
        self.persist(&snapshot).await
    }

    pub async fn cleanup_expired(&self) -> Result<usize, ExemptionError> {
        let now = self.clock.now();
        let (removed, snapshot) = {
            let mut guard = self.cache.write();
            let before = guard.len();
            guard.retain(|e| now < e.expires_at);
            (before - guard.len(), guard.clone())
        };
        if removed > 0 {
            self.persist(&snapshot).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::InMemoryResourceStore;
    use freezegate_kernel::clock::FixedClock;

    fn setup(now: DateTime<Utc>) -> ExemptionManager {
        let store = Arc::new(InMemoryResourceStore::new());
        let clock = Arc::new(FixedClock::new(now));
        ExemptionManager::new(store, clock)
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-12-25T10:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn check_returns_exemption_regardless_of_used_flag() {
        let mgr = setup(now());
        let created = mgr
            .create(NewExemption {
                namespace: "prod".to_string(),
                resource_name: None,
                duration_minutes: 60,
                reason: "incident".to_string(),
                approved_by: "alice".to_string(),
            })
            .await
            .unwrap();
        mgr.mark_used(created.id).await.unwrap();
        let found = mgr.check("prod", Some("api")).unwrap();
        assert_eq!(found.id, created.id);
        assert!(found.used);
    }

    #[tokio::test]
    async fn resource_specific_exemption_does_not_match_other_resources() {
        let mgr = setup(now());
        mgr.create(NewExemption {
            namespace: "prod".to_string(),
            resource_name: Some("api".to_string()),
            duration_minutes: 60,
            reason: "incident".to_string(),
            approved_by: "alice".to_string(),
        })
        .await
        .unwrap();
        assert!(mgr.check("prod", Some("worker")).is_none());
        assert!(mgr.check("prod", Some("api")).is_some());
    }

    #[tokio::test]
    async fn check_prefers_nearest_expiry() {
        let mgr = setup(now());
        mgr.create(NewExemption {
            namespace: "prod".to_string(),
            resource_name: None,
            duration_minutes: 120,
            reason: "long".to_string(),
            approved_by: "alice".to_string(),
        })
        .await
        .unwrap();
        let soon = mgr
            .create(NewExemption {
                namespace: "prod".to_string(),
                resource_name: None,
                duration_minutes: 10,
                reason: "short".to_string(),
                approved_by: "bob".to_string(),
            })
            .await
            .unwrap();
        let found = mgr.check("prod", None).unwrap();
        assert_eq!(found.id, soon.id);
    }

    #[tokio::test]
    async fn create_serialize_deserialize_round_trips() {
        let mgr = setup(now());
        let created = mgr
            .create(NewExemption {
                namespace: "prod".to_string(),
                resource_name: None,
                duration_minutes: 30,
                reason: "r".to_string(),
                approved_by: "a".to_string(),
            })
            .await
            .unwrap();
        let json = serde_json::to_string(&created).unwrap();
        let back: Exemption = serde_json::from_str(&json).unwrap();
        assert_eq!(back, created);
    }

    #[tokio::test]
    async fn cleanup_expired_removes_past_exemptions() {
        let mgr = setup(now());
        mgr.create(NewExemption {
            namespace: "prod".to_string(),
            resource_name: None,
            duration_minutes: -5,
            reason: "already expired".to_string(),
            approved_by: "a".to_string(),
        })
        .await
        .unwrap();
        let removed = mgr.cleanup_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert!(mgr.list(None, false).is_empty());
    }
}
