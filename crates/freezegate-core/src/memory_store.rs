use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use freezegate_kernel::error::ConfigError;
use freezegate_kernel::store::{ResourceRecord, ResourceStore, WatchEvent, WatchStream};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Default `ResourceStore` for tests and the demo binary: a `HashMap`
/// behind a single mutex, with a `broadcast` channel per record name so
/// `watch` can fan a change out to every subscriber without blocking
/// writers. Grounded on the in-memory persistence adapters elsewhere in
/// the pack that pair `Arc<Mutex<HashMap<...>>>` state with a channel for
/// the reactive side.
pub struct InMemoryResourceStore {
    records: Mutex<HashMap<String, ResourceRecord>>,
    channels: Mutex<HashMap<String, broadcast::Sender<WatchEvent>>>,
}

impl Default for InMemoryResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self { records: Mutex::new(HashMap::new()), channels: Mutex::new(HashMap::new()) }
    }

    pub fn with_seed(name: impl Into<String>, record: ResourceRecord) -> Arc<Self> {
        let store = Arc::new(Self::new());
        store.records.lock().insert(name.into(), record);
        store
    }

    fn sender_for(&self, name: &str) -> broadcast::Sender<WatchEvent> {
        let mut channels = self.channels.lock();
        channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(32).0)
            .clone()
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn read(&self, name: &str) -> Result<Option<ResourceRecord>, ConfigError> {
        Ok(self.records.lock().get(name).cloned())
    }

    async fn create(&self, name: &str, record: ResourceRecord) -> Result<(), ConfigError> {
        self.records.lock().insert(name.to_string(), record.clone());
        let _ = self.sender_for(name).send(WatchEvent::Added(record));
        Ok(())
    }

    async fn patch(&self, name: &str, record: ResourceRecord) -> Result<(), ConfigError> {
        self.records.lock().insert(name.to_string(), record.clone());
        let _ = self.sender_for(name).send(WatchEvent::Modified(record));
        Ok(())
    }

    fn watch(&self, name: &str) -> WatchStream {
        let rx = self.sender_for(name).subscribe();
        let stream = BroadcastStream::new(rx).filter_map(|item| match item {
            Ok(event) => Some(Ok(event)),
            Err(_lagged) => None,
        });
        Box::pin(stream)
    }
}
