use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::sink::{DispatchEvent, Sink};

/// Appends one JSON line per delivered event. Used for `AUDIT_LOG_FILE`
/// and as the default dev-mode notification sink.
pub struct FileSink {
    path: PathBuf,
    event_types: Option<Vec<String>>,
}

impl FileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path, event_types: None }
    }

    pub fn with_filter(path: PathBuf, event_types: Vec<String>) -> Self {
        Self { path, event_types: Some(event_types) }
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    fn supports(&self, event_type: &str) -> bool {
        match &self.event_types {
            Some(allowed) => allowed.iter().any(|t| t == event_type),
            None => true,
        }
    }

    async fn deliver(&self, event: &DispatchEvent) -> anyhow::Result<()> {
        let line = serde_json::json!({
            "event_type": event.event_type,
            "namespace": event.namespace,
            "payload": event.payload,
        });
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(line.to_string().as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(())
    }
}
