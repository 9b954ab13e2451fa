use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The reactive configuration built by the Config Loader from the `policy`
/// record. `freezeSchedule` is populated from the Schedule Store, not from
/// the policy record itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub freeze_enabled: bool,
    pub freeze_until: Option<DateTime<Utc>>,
    pub freeze_message: String,
    pub bypass_annotation_key: String,
    pub bypass_allowed_users: BTreeSet<String>,
    pub api_allowed_serviceaccounts: BTreeSet<String>,
    pub bypass_exempt_namespaces: BTreeSet<String>,
    pub monitored_resources: BTreeSet<String>,
    pub fail_closed: bool,
    pub freeze_schedule: Vec<Schedule>,
}

impl Default for Policy {
    fn default() -> Self {
        let mut monitored_resources = BTreeSet::new();
        monitored_resources.insert("deployments".to_string());
        Self {
            freeze_enabled: false,
            freeze_until: None,
            freeze_message: "Deployments are currently frozen".to_string(),
            bypass_annotation_key: "admission-controller.io/emergency-bypass".to_string(),
            bypass_allowed_users: BTreeSet::new(),
            api_allowed_serviceaccounts: BTreeSet::new(),
            bypass_exempt_namespaces: BTreeSet::new(),
            monitored_resources,
            fail_closed: false,
            freeze_schedule: Vec::new(),
        }
    }
}

/// The canonical freeze-window entity. Field declaration order here IS the
/// canonical wire order (`name, start, end, cron, namespaces?, message?`) —
/// derive(Serialize) emits fields in declaration order, so this struct's
/// layout is the enforcement mechanism. Do not reorder these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub cron: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Schedule {
    /// A Schedule is valid only if `end > start` and `cron` parses.
    pub fn structurally_valid(&self) -> bool {
        self.end > self.start && !self.cron.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exemption {
    pub id: Uuid,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    pub duration_minutes: i64,
    pub reason: String,
    pub approved_by: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub used: bool,
}

impl Exemption {
    /// `used` is informational only — it never invalidates the exemption.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn matches(&self, namespace: &str, resource_name: Option<&str>) -> bool {
        if self.namespace != namespace {
            return false;
        }
        match &self.resource_name {
            Some(scoped) => Some(scoped.as_str()) == resource_name,
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub id: Uuid,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freeze_window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(rename = "type")]
    pub actor_type: String,
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub actor: Actor,
    pub resource: AuditResource,
    pub outcome: AuditOutcome,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub compliance_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSchedule {
    pub cron: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub schedule: TemplateSchedule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
