//! Wires a Notification Dispatcher and an Audit Sink Set together behind
//! the single `EventSink` seam the Admission Engine calls through. The two
//! dispatchers are configured independently (different sink lists,
//! different rate-limit state) but share the same fan-out/swallow
//! machinery.

use async_trait::async_trait;
use freezegate_kernel::model::AuditEvent;
use freezegate_kernel::sink::{EventSink, GovernanceEvent};

use crate::dispatch::Dispatcher;

pub struct EventSinkSet {
    notifications: Dispatcher,
    audit: Dispatcher,
}

impl EventSinkSet {
    pub fn new(notifications: Dispatcher, audit: Dispatcher) -> Self {
        Self { notifications, audit }
    }
}

#[async_trait]
impl EventSink for EventSinkSet {
    async fn notify(&self, event: GovernanceEvent) {
        self.notifications.dispatch(event.into()).await;
    }

    async fn audit(&self, event: AuditEvent) {
        self.audit.dispatch(event.into()).await;
    }
}
