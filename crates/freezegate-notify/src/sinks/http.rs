use async_trait::async_trait;

use crate::sink::{DispatchEvent, Sink};

/// Posts the event as JSON to a configured webhook URL. Used for generic
/// HTTP notification targets (e.g. a Slack incoming webhook, PagerDuty).
pub struct HttpSink {
    url: String,
    client: reqwest::Client,
    event_types: Vec<String>,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, event_types: Vec<String>) -> Self {
        Self { url: url.into(), client: reqwest::Client::new(), event_types }
    }
}

#[async_trait]
impl Sink for HttpSink {
    fn name(&self) -> &'static str {
        "http"
    }

    fn supports(&self, event_type: &str) -> bool {
        self.event_types.iter().any(|t| t == event_type)
    }

    async fn deliver(&self, event: &DispatchEvent) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "event_type": event.event_type,
                "namespace": event.namespace,
                "payload": event.payload,
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("webhook {} returned {}", self.url, response.status());
        }
        Ok(())
    }
}
