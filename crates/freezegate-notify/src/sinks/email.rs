use async_trait::async_trait;

use crate::sink::{DispatchEvent, Sink};

/// SMTP transport is out of scope for this crate (it's a pluggable
/// adapter); `Mailer` is the seam a real SMTP client would implement.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Logs what would have been sent. Stands in for a real transport in
/// tests and in deployments that haven't wired one up yet.
pub struct LoggingMailer;

#[async_trait]
impl Mailer for LoggingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to, subject, body, "email notification (no mailer configured)");
        Ok(())
    }
}

pub struct EmailSink {
    recipients: Vec<String>,
    mailer: Box<dyn Mailer>,
}

impl EmailSink {
    pub fn new(recipients: Vec<String>, mailer: Box<dyn Mailer>) -> Self {
        Self { recipients, mailer }
    }
}

#[async_trait]
impl Sink for EmailSink {
    fn name(&self) -> &'static str {
        "email"
    }

    fn supports(&self, event_type: &str) -> bool {
        matches!(event_type, "violation")
    }

    async fn deliver(&self, event: &DispatchEvent) -> anyhow::Result<()> {
        let subject = format!("Freeze policy event: {}", event.event_type);
        let body = event.payload.to_string();
        for recipient in &self.recipients {
            self.mailer.send(recipient, &subject, &body).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_every_recipient() {
        let sink = EmailSink::new(vec!["ops@example.com".to_string()], Box::new(LoggingMailer));
        let event = DispatchEvent {
            event_type: "violation".to_string(),
            namespace: Some("prod".to_string()),
            payload: serde_json::json!({"resource": "api"}),
        };
        assert!(sink.deliver(&event).await.is_ok());
    }

    #[test]
    fn only_supports_violation_events() {
        let sink = EmailSink::new(vec![], Box::new(LoggingMailer));
        assert!(sink.supports("violation"));
        assert!(!sink.supports("bypass_granted"));
    }
}
