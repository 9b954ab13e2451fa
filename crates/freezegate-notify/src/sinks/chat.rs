use async_trait::async_trait;

use crate::sink::{DispatchEvent, Sink};

/// Formats an event as a human-readable chat message and posts it to an
/// incoming-webhook style endpoint. Distinct from `HttpSink` in that it
/// shapes a `text` payload rather than forwarding the raw event envelope.
pub struct ChatSink {
    webhook_url: String,
    client: reqwest::Client,
}

impl ChatSink {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self { webhook_url: webhook_url.into(), client: reqwest::Client::new() }
    }

    fn format_message(event: &DispatchEvent) -> String {
        match event.namespace.as_deref() {
            Some(ns) => format!("[{}] {} in namespace `{}`", event.event_type, event.payload, ns),
            None => format!("[{}] {}", event.event_type, event.payload),
        }
    }
}

#[async_trait]
impl Sink for ChatSink {
    fn name(&self) -> &'static str {
        "chat"
    }

    fn supports(&self, event_type: &str) -> bool {
        matches!(event_type, "violation" | "bypass_granted" | "exemption_used")
    }

    async fn deliver(&self, event: &DispatchEvent) -> anyhow::Result<()> {
        let body = serde_json::json!({ "text": Self::format_message(event) });
        let response = self.client.post(&self.webhook_url).json(&body).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("chat webhook returned {}", response.status());
        }
        Ok(())
    }
}
