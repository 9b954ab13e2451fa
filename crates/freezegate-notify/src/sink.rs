use async_trait::async_trait;
use freezegate_kernel::model::AuditEvent;
use freezegate_kernel::sink::GovernanceEvent;
use serde_json::Value;

/// The common shape every sink delivers, regardless of whether it started
/// life as a governance notification or an audit event.
#[derive(Debug, Clone)]
pub struct DispatchEvent {
    pub event_type: String,
    pub namespace: Option<String>,
    pub payload: Value,
}

impl From<GovernanceEvent> for DispatchEvent {
    fn from(event: GovernanceEvent) -> Self {
        Self { event_type: event.event_type, namespace: event.namespace, payload: event.payload }
    }
}

impl From<AuditEvent> for DispatchEvent {
    fn from(event: AuditEvent) -> Self {
        let namespace = event.resource.namespace.clone();
        Self {
            event_type: event.event_type.clone(),
            namespace,
            payload: serde_json::to_value(&event).unwrap_or(Value::Null),
        }
    }
}

/// A capability provider: declares which event types it cares about, then
/// delivers matching events. The dispatcher owns rate limiting and error
/// swallowing — sinks just report failure.
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &'static str;
    fn supports(&self, event_type: &str) -> bool;
    async fn deliver(&self, event: &DispatchEvent) -> anyhow::Result<()>;
}
