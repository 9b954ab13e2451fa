use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ConfigError;

/// A single named, namespaced configuration record as the external store
/// sees it: a flat string map (mirrors a Kubernetes ConfigMap's `data`)
/// plus an opaque version token used only for logging/diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceRecord {
    pub data: BTreeMap<String, String>,
    pub resource_version: String,
}

impl ResourceRecord {
    pub fn single(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut data = BTreeMap::new();
        data.insert(key.into(), value.into());
        Self { data, resource_version: String::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(ResourceRecord),
    Modified(ResourceRecord),
    Deleted,
}

pub type WatchStream = Pin<Box<dyn Stream<Item = Result<WatchEvent, ConfigError>> + Send>>;

/// The one boundary every manager in this system goes through to reach
/// durable state. Read/patch/create/watch over named records; no component
/// is allowed to depend on a concrete backend.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn read(&self, name: &str) -> Result<Option<ResourceRecord>, ConfigError>;
    async fn create(&self, name: &str, record: ResourceRecord) -> Result<(), ConfigError>;
    async fn patch(&self, name: &str, record: ResourceRecord) -> Result<(), ConfigError>;
    fn watch(&self, name: &str) -> WatchStream;
}
