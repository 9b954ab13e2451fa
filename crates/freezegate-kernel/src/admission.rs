use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AdmissionError;
use crate::model::Policy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// The apiserver sends `kind` as a `GroupVersionKind` object, not a bare
/// string — only the `kind` field is meaningful here, `group`/`version` are
/// accepted and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestKind {
    pub kind: String,
}

/// A normalized admission request, already unwrapped from the
/// `AdmissionReview` envelope by the boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: RequestKind,
    pub namespace: Option<String>,
    pub name: String,
    pub operation: String,
    #[serde(default)]
    pub object: Value,
    #[serde(rename = "userInfo", default)]
    pub user_info: UserInfo,
    #[serde(rename = "dryRun", default)]
    pub dry_run: Value,
}

impl AdmissionRequest {
    pub fn kind_name(&self) -> &str {
        &self.kind.kind
    }

    /// Detects dry-run: boolean `true`, or a non-empty list/string.
    pub fn is_dry_run(&self) -> bool {
        match &self.dry_run {
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => false,
        }
    }

    pub fn annotations(&self) -> serde_json::Map<String, Value> {
        self.object
            .get("metadata")
            .and_then(|m| m.get("annotations"))
            .and_then(|a| a.as_object())
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    #[serde(rename = "type")]
    pub warning_type: String,
    pub message: String,
    pub bypass_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bypass_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl AdmissionResponse {
    pub fn allow(uid: impl Into<String>) -> Self {
        Self { uid: uid.into(), allowed: true, ..Default::default() }
    }

    pub fn deny(uid: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            allowed: false,
            status_code: Some(status_code),
            message: Some(message.into()),
            warnings: Vec::new(),
        }
    }
}

/// Per-request scratch threaded through the pipeline. Carries the bypass
/// outcome so later stages (history/audit) can report how the request was
/// resolved without recomputing it.
#[derive(Debug, Clone)]
pub struct AdmissionContext {
    pub request: AdmissionRequest,
    pub policy: Policy,
    pub resolved_kind: Option<String>,
    pub bypass_type: Option<String>,
    pub active_window: Option<String>,
}

impl AdmissionContext {
    pub fn new(request: AdmissionRequest, policy: Policy) -> Self {
        Self { request, policy, resolved_kind: None, bypass_type: None, active_window: None }
    }
}

/// Outcome of a single pipeline stage: either the request moves on to the
/// next stage, or the pipeline short-circuits with a final verdict.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    Continue,
    Decide(AdmissionResponse),
}

/// One ordered step of the Admission Engine (§4.J). Stage order is fixed by
/// contract, not discovered at runtime — the engine simply iterates a
/// `Vec<Box<dyn AdmissionStage>>` in declaration order and stops at the
/// first `Decide`.
#[async_trait]
pub trait AdmissionStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn evaluate(&self, ctx: &mut AdmissionContext) -> Result<StageOutcome, AdmissionError>;
}
