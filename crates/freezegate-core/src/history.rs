use std::collections::VecDeque;
use std::sync::Arc;

use freezegate_kernel::clock::Clock;
use freezegate_kernel::error::ConfigError;
use freezegate_kernel::model::HistoryEvent;
use freezegate_kernel::store::{ResourceRecord, ResourceStore};
use parking_lot::RwLock;
use uuid::Uuid;

const RECORD_NAME: &str = "history";
const DATA_KEY: &str = "history.json";
const DEFAULT_MAX_EVENTS: usize = 1000;

pub struct NewHistoryEvent {
    pub event_type: String,
    pub reason: String,
    pub freeze_window: Option<String>,
    pub namespace: Option<String>,
    pub duration_minutes: Option<i64>,
    pub triggered_by: Option<String>,
}

/// Append-only ring of governance events, persisted opportunistically after
/// each append. The persisted sequence is always a suffix of everything
/// ever recorded, of length at most `max_events`.
pub struct HistoryTracker {
    store: Arc<dyn ResourceStore>,
    clock: Arc<dyn Clock>,
    max_events: usize,
    ring: RwLock<VecDeque<HistoryEvent>>,
}

impl HistoryTracker {
    pub fn new(store: Arc<dyn ResourceStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(store, clock, DEFAULT_MAX_EVENTS)
    }

    pub fn with_capacity(store: Arc<dyn ResourceStore>, clock: Arc<dyn Clock>, max_events: usize) -> Self {
        Self { store, clock, max_events, ring: RwLock::new(VecDeque::new()) }
    }

    pub async fn load(&self) -> Result<(), ConfigError> {
        let record = self.store.read(RECORD_NAME).await?;
        let events: Vec<HistoryEvent> = match record.and_then(|r| r.data.get(DATA_KEY).cloned()) {
            Some(body) => serde_json::from_str(&body).unwrap_or_default(),
            None => Vec::new(),
        };
        *self.ring.write() = events.into();
        Ok(())
    }

    async fn persist(&self, events: &VecDeque<HistoryEvent>) -> Result<(), ConfigError> {
        let as_vec: Vec<&HistoryEvent> = events.iter().collect();
        let body = serde_json::to_string(&as_vec).expect("history always serializes");
        self.store.patch(RECORD_NAME, ResourceRecord::single(DATA_KEY, body)).await
    }

    pub async fn record(&self, event: NewHistoryEvent) -> HistoryEvent {
        let entry = HistoryEvent {
            id: Uuid::new_v4(),
            event_type: event.event_type,
            timestamp: self.clock.now(),
            reason: event.reason,
            freeze_window: event.freeze_window,
            namespace: event.namespace,
            duration_minutes: event.duration_minutes,
            triggered_by: event.triggered_by,
        };
        let snapshot = {
            let mut guard = self.ring.write();
            guard.push_back(entry.clone());
            while guard.len() > self.max_events {
                guard.pop_front();
            }
            guard.clone()
        };
        if let Err(err) = self.persist(&snapshot).await {
            tracing::warn!(%err, "failed to persist history event, keeping in-memory ring");
        }
        entry
    }

    pub fn list(&self, event_type: Option<&str>, namespace: Option<&str>, limit: usize) -> Vec<HistoryEvent> {
        self.ring
            .read()
            .iter()
            .rev()
            .filter(|e| event_type.is_none_or(|t| e.event_type == t))
            .filter(|e| namespace.is_none_or(|ns| e.namespace.as_deref() == Some(ns)))
            .take(limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::InMemoryResourceStore;
    use freezegate_kernel::clock::FixedClock;
    use chrono::Utc;

    fn setup(capacity: usize) -> HistoryTracker {
        let store = Arc::new(InMemoryResourceStore::new());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        HistoryTracker::with_capacity(store, clock, capacity)
    }

    fn event(event_type: &str) -> NewHistoryEvent {
        NewHistoryEvent {
            event_type: event_type.to_string(),
            reason: "test".to_string(),
            freeze_window: None,
            namespace: Some("prod".to_string()),
            duration_minutes: None,
            triggered_by: None,
        }
    }

    #[tokio::test]
    async fn ring_drops_oldest_on_overflow() {
        let tracker = setup(2);
        tracker.record(event("a")).await;
        tracker.record(event("b")).await;
        tracker.record(event("c")).await;
        let events = tracker.list(None, None, 10);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "c");
        assert_eq!(events[1].event_type, "b");
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = Arc::new(InMemoryResourceStore::new());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let tracker = HistoryTracker::new(store.clone(), clock.clone());
        tracker.record(event("bypass_granted")).await;
        tracker.record(event("violation")).await;

        let reloaded = HistoryTracker::new(store, clock);
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.list(None, None, 10), tracker.list(None, None, 10));
    }
}
