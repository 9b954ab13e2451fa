use async_trait::async_trait;
use serde_json::Value;

use crate::model::AuditEvent;

/// A governance notification: something the Admission Engine or a manager
/// wants observers told about (bypass granted, exemption used, freeze
/// violation). Payload shape is sink-defined.
#[derive(Debug, Clone)]
pub struct GovernanceEvent {
    pub event_type: String,
    pub namespace: Option<String>,
    pub payload: Value,
}

/// The seam between the Admission Engine (which only knows "something
/// happened") and the Notification Dispatcher / Audit Sink Set (which know
/// how to tell someone). Implemented by `freezegate-notify`'s dispatcher so
/// that `freezegate-core` never depends on concrete sink transports.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn notify(&self, event: GovernanceEvent);
    async fn audit(&self, event: AuditEvent);
}
