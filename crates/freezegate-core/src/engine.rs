//! The decision pipeline (§4.J): an ordered, short-circuiting `Vec<Box<dyn
//! AdmissionStage>>` (match on the first non-`Continue` outcome, run in
//! declaration order). Stage order here is fixed by contract rather than
//! discovered from a per-filter priority, so the engine is a straight-line
//! loop, not a sorted pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use freezegate_kernel::admission::{
    AdmissionContext, AdmissionRequest, AdmissionResponse, AdmissionStage, RequestKind, StageOutcome, Warning,
};
use freezegate_kernel::clock::Clock;
use freezegate_kernel::error::AdmissionError;
use freezegate_kernel::model::{Actor, AuditOutcome, AuditResource, Policy};
use freezegate_kernel::sink::{EventSink, GovernanceEvent};
use serde_json::json;
use uuid::Uuid;

use crate::bypass::check_bypass;
use crate::dryrun::{shape_as_warnings, WouldDenyCondition};
use crate::exemption::ExemptionManager;
use crate::history::{HistoryTracker, NewHistoryEvent};
use crate::schedule::is_freeze_active;

fn normalize_plural(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') {
        return lower;
    }
    let mut chars = lower.chars().rev();
    let last = chars.next();
    let before_last = chars.next();
    if last == Some('y') {
        let is_vowel_before = before_last.map(|c| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')).unwrap_or(false);
        if !is_vowel_before {
            return format!("{}ies", &lower[..lower.len() - 1]);
        }
    }
    format!("{lower}s")
}

struct ScopeFilterStage;

#[async_trait]
impl AdmissionStage for ScopeFilterStage {
    fn name(&self) -> &'static str {
        "scope_filter"
    }

    async fn evaluate(&self, ctx: &mut AdmissionContext) -> Result<StageOutcome, AdmissionError> {
        let singular = ctx.request.kind_name().to_lowercase();
        let plural = normalize_plural(ctx.request.kind_name());
        let monitored = &ctx.policy.monitored_resources;
        if !monitored.contains(&singular) && !monitored.contains(&plural) {
            return Ok(StageOutcome::Decide(AdmissionResponse::allow(&ctx.request.uid)));
        }
        ctx.resolved_kind = Some(plural);
        Ok(StageOutcome::Continue)
    }
}

struct NamespaceExemptionStage;

#[async_trait]
impl AdmissionStage for NamespaceExemptionStage {
    fn name(&self) -> &'static str {
        "namespace_exemption"
    }

    async fn evaluate(&self, ctx: &mut AdmissionContext) -> Result<StageOutcome, AdmissionError> {
        if let Some(ns) = &ctx.request.namespace {
            if ctx.policy.bypass_exempt_namespaces.contains(ns) {
                return Ok(StageOutcome::Decide(AdmissionResponse::allow(&ctx.request.uid)));
            }
        }
        Ok(StageOutcome::Continue)
    }
}

struct SyncBypassStage {
    sink: Option<Arc<dyn EventSink>>,
    history: Option<Arc<HistoryTracker>>,
}

#[async_trait]
impl AdmissionStage for SyncBypassStage {
    fn name(&self) -> &'static str {
        "sync_bypass"
    }

    async fn evaluate(&self, ctx: &mut AdmissionContext) -> Result<StageOutcome, AdmissionError> {
        let outcome = check_bypass(&ctx.request, &ctx.policy);
        if !outcome.allowed {
            return Ok(StageOutcome::Continue);
        }
        ctx.bypass_type = outcome.bypass_type.map(str::to_string);
        if let Some(history) = &self.history {
            history
                .record(NewHistoryEvent {
                    event_type: "bypass_granted".to_string(),
                    reason: outcome.reason.clone(),
                    freeze_window: None,
                    namespace: ctx.request.namespace.clone(),
                    duration_minutes: None,
                    triggered_by: Some(ctx.request.user_info.username.clone()),
                })
                .await;
        }
        if let Some(sink) = &self.sink {
            sink.notify(GovernanceEvent {
                event_type: "bypass_granted".to_string(),
                namespace: ctx.request.namespace.clone(),
                payload: json!({"type": outcome.bypass_type, "reason": outcome.reason}),
            })
            .await;
        }
        Ok(StageOutcome::Decide(AdmissionResponse::allow(&ctx.request.uid)))
    }
}

struct TemporaryExemptionStage {
    exemptions: Arc<ExemptionManager>,
    history: Option<Arc<HistoryTracker>>,
}

#[async_trait]
impl AdmissionStage for TemporaryExemptionStage {
    fn name(&self) -> &'static str {
        "temporary_exemption"
    }

    async fn evaluate(&self, ctx: &mut AdmissionContext) -> Result<StageOutcome, AdmissionError> {
        let namespace = match &ctx.request.namespace {
            Some(ns) => ns.clone(),
            None => return Ok(StageOutcome::Continue),
        };
        let resource_name = Some(ctx.request.name.as_str());
        let exemption = match self.exemptions.check(&namespace, resource_name) {
            Some(e) => e,
            None => return Ok(StageOutcome::Continue),
        };
        let _ = self.exemptions.mark_used(exemption.id).await;
        if let Some(history) = &self.history {
            history
                .record(NewHistoryEvent {
                    event_type: "exemption_used".to_string(),
                    reason: exemption.reason.clone(),
                    freeze_window: None,
                    namespace: Some(namespace),
                    duration_minutes: Some(exemption.duration_minutes),
                    triggered_by: Some(exemption.approved_by.clone()),
                })
                .await;
        }
        Ok(StageOutcome::Decide(AdmissionResponse::allow(&ctx.request.uid)))
    }
}

struct FreezeEvaluationStage {
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl AdmissionStage for FreezeEvaluationStage {
    fn name(&self) -> &'static str {
        "freeze_evaluation"
    }

    async fn evaluate(&self, ctx: &mut AdmissionContext) -> Result<StageOutcome, AdmissionError> {
        let now = self.clock.now();
        let (active, window) = is_freeze_active(&ctx.policy, now, ctx.request.namespace.as_deref());
        if !active {
            return Ok(StageOutcome::Decide(AdmissionResponse::allow(&ctx.request.uid)));
        }
        ctx.active_window = window;
        Ok(StageOutcome::Continue)
    }
}

struct DryRunStage;

#[async_trait]
impl AdmissionStage for DryRunStage {
    fn name(&self) -> &'static str {
        "dry_run"
    }

    async fn evaluate(&self, ctx: &mut AdmissionContext) -> Result<StageOutcome, AdmissionError> {
        if !ctx.request.is_dry_run() {
            return Ok(StageOutcome::Continue);
        }
        let message = deny_message(&ctx.policy, ctx.active_window.as_deref());
        let warnings: Vec<Warning> = shape_as_warnings(&[WouldDenyCondition {
            warning_type: "FreezeActive",
            message,
            bypass_available: !ctx.policy.bypass_allowed_users.is_empty(),
            bypass_type: None,
        }]);
        let mut response = AdmissionResponse::allow(&ctx.request.uid);
        response.warnings = warnings;
        Ok(StageOutcome::Decide(response))
    }
}

struct DenyStage {
    sink: Option<Arc<dyn EventSink>>,
    history: Option<Arc<HistoryTracker>>,
}

#[async_trait]
impl AdmissionStage for DenyStage {
    fn name(&self) -> &'static str {
        "deny"
    }

    async fn evaluate(&self, ctx: &mut AdmissionContext) -> Result<StageOutcome, AdmissionError> {
        let message = deny_message(&ctx.policy, ctx.active_window.as_deref());
        if let Some(history) = &self.history {
            history
                .record(NewHistoryEvent {
                    event_type: "violation".to_string(),
                    reason: message.clone(),
                    freeze_window: ctx.active_window.clone(),
                    namespace: ctx.request.namespace.clone(),
                    duration_minutes: None,
                    triggered_by: Some(ctx.request.user_info.username.clone()),
                })
                .await;
        }
        if let Some(sink) = &self.sink {
            sink.notify(GovernanceEvent {
                event_type: "violation".to_string(),
                namespace: ctx.request.namespace.clone(),
                payload: json!({"window": ctx.active_window, "resource": ctx.request.name}),
            })
            .await;
            sink.audit(freezegate_kernel::model::AuditEvent {
                id: Uuid::new_v4(),
                timestamp: chrono::Utc::now(),
                event_type: "admission.denied".to_string(),
                actor: Actor {
                    actor_type: "user".to_string(),
                    identity: ctx.request.user_info.username.clone(),
                    ip: None,
                    ua: None,
                    session: None,
                },
                resource: AuditResource {
                    resource_type: ctx.request.kind_name().to_string(),
                    name: ctx.request.name.clone(),
                    namespace: ctx.request.namespace.clone(),
                    cluster: None,
                },
                outcome: AuditOutcome::Denied,
                details: message.clone(),
                compliance_tags: Vec::new(),
            })
            .await;
        }
        Ok(StageOutcome::Decide(AdmissionResponse::deny(&ctx.request.uid, 403, message)))
    }
}

fn deny_message(policy: &Policy, window: Option<&str>) -> String {
    match window {
        Some(name) => format!("{} (Freeze window: {name})", policy.freeze_message),
        None => policy.freeze_message.clone(),
    }
}

/// Composes the seven fixed stages. Constructed once per process and
/// shared across requests; holds no mutable state itself.
pub struct AdmissionEngine {
    stages: Vec<Box<dyn AdmissionStage>>,
}

impl AdmissionEngine {
    pub fn new(clock: Arc<dyn Clock>, exemptions: Arc<ExemptionManager>, history: Option<Arc<HistoryTracker>>, sink: Option<Arc<dyn EventSink>>) -> Self {
        let stages: Vec<Box<dyn AdmissionStage>> = vec![
            Box::new(ScopeFilterStage),
            Box::new(NamespaceExemptionStage),
            Box::new(SyncBypassStage { sink: sink.clone(), history: history.clone() }),
            Box::new(TemporaryExemptionStage { exemptions, history: history.clone() }),
            Box::new(FreezeEvaluationStage { clock }),
            Box::new(DryRunStage),
            Box::new(DenyStage { sink, history }),
        ];
        Self { stages }
    }

    /// Decides a request against `policy`. Per §4.J, the decision depends
    /// only on this snapshot — a concurrent policy reload cannot affect an
    /// in-flight decision because `policy` is passed by value here.
    pub async fn decide(&self, request: AdmissionRequest, policy: Policy, fail_closed_if_unready: bool) -> AdmissionResponse {
        if fail_closed_if_unready {
            return AdmissionResponse::deny(&request.uid, 403, "Configuration not yet loaded, failing closed");
        }
        let uid = request.uid.clone();
        let mut ctx = AdmissionContext::new(request, policy);
        for stage in &self.stages {
            match stage.evaluate(&mut ctx).await {
                Ok(StageOutcome::Continue) => continue,
                Ok(StageOutcome::Decide(response)) => return response,
                Err(err) => {
                    tracing::warn!(stage = stage.name(), %err, "admission stage failed, following fail-closed policy");
                    return if ctx.policy.fail_closed {
                        AdmissionResponse::deny(&uid, 500, "Internal error while evaluating freeze policy")
                    } else {
                        AdmissionResponse::allow(&uid)
                    };
                }
            }
        }
        // Unreachable: DenyStage always decides. Kept as a defensive allow
        // so a future stage reorder can't silently hang a request.
        AdmissionResponse::allow(&uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::InMemoryResourceStore;
    use freezegate_kernel::admission::UserInfo;
    use freezegate_kernel::clock::FixedClock;
    use freezegate_kernel::model::Schedule;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn base_request(kind: &str, namespace: &str) -> AdmissionRequest {
        AdmissionRequest {
            uid: "req-1".to_string(),
            kind: RequestKind { kind: kind.to_string() },
            namespace: Some(namespace.to_string()),
            name: "api".to_string(),
            operation: "UPDATE".to_string(),
            object: json!({"metadata": {"annotations": {}}}),
            user_info: UserInfo { username: "bob".to_string(), groups: vec![] },
            dry_run: json!(false),
        }
    }

    fn engine(now: chrono::DateTime<chrono::Utc>) -> (AdmissionEngine, Arc<ExemptionManager>) {
        let store = Arc::new(InMemoryResourceStore::new());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(now));
        let exemptions = Arc::new(ExemptionManager::new(store, clock.clone()));
        (AdmissionEngine::new(clock, exemptions.clone(), None, None), exemptions)
    }

    #[tokio::test]
    async fn scenario_1_manual_freeze_denies_without_warnings() {
        let (engine, _) = engine(chrono::Utc::now());
        let mut policy = Policy::default();
        policy.freeze_enabled = true;
        policy.freeze_message = "Deployments are frozen".to_string();
        let response = engine.decide(base_request("Deployment", "prod"), policy, false).await;
        assert!(!response.allowed);
        assert_eq!(response.status_code, Some(403));
        assert!(response.warnings.is_empty());
    }

    #[tokio::test]
    async fn scenario_2_annotation_bypass_allows() {
        let (engine, _) = engine(chrono::Utc::now());
        let mut policy = Policy::default();
        policy.freeze_enabled = true;
        let mut request = base_request("Deployment", "prod");
        request.object = json!({"metadata": {"annotations": {
            "admission-controller.io/emergency-bypass": "true",
            "admission-controller.io/emergency-reason": "hotfix",
        }}});
        let response = engine.decide(request, policy, false).await;
        assert!(response.allowed);
    }

    #[tokio::test]
    async fn scenario_3_namespace_exempt_from_dateranged_schedule_allows() {
        let now = DateTimeHelper::t("2024-12-25T10:30:00Z");
        let (engine, _) = engine(now);
        let mut policy = Policy::default();
        policy.bypass_exempt_namespaces.insert("staging".to_string());
        policy.freeze_schedule.push(Schedule {
            name: "holiday".to_string(),
            start: DateTimeHelper::t("2024-12-24T00:00:00Z"),
            end: DateTimeHelper::t("2024-12-27T00:00:00Z"),
            cron: "0 0 * * *".to_string(),
            namespaces: Some(BTreeSet::new()),
            message: None,
        });
        let response = engine.decide(base_request("Deployment", "staging"), policy, false).await;
        assert!(response.allowed);
    }

    #[tokio::test]
    async fn scenario_4_same_schedule_in_prod_denies_with_window_name() {
        let now = DateTimeHelper::t("2024-12-25T10:30:00Z");
        let (engine, _) = engine(now);
        let mut policy = Policy::default();
        policy.bypass_exempt_namespaces.insert("staging".to_string());
        policy.freeze_schedule.push(Schedule {
            name: "holiday".to_string(),
            start: DateTimeHelper::t("2024-12-24T00:00:00Z"),
            end: DateTimeHelper::t("2024-12-27T00:00:00Z"),
            cron: "0 0 * * *".to_string(),
            namespaces: Some(BTreeSet::new()),
            message: None,
        });
        let response = engine.decide(base_request("Deployment", "prod"), policy, false).await;
        assert!(!response.allowed);
        assert!(response.message.unwrap().contains("holiday"));
    }

    #[tokio::test]
    async fn scenario_5_dry_run_always_allows_with_warning() {
        let (engine, _) = engine(chrono::Utc::now());
        let mut policy = Policy::default();
        policy.freeze_enabled = true;
        let mut request = base_request("Deployment", "prod");
        request.dry_run = json!(true);
        let response = engine.decide(request, policy, false).await;
        assert!(response.allowed);
        assert_eq!(response.warnings.len(), 1);
        assert_eq!(response.warnings[0].warning_type, "FreezeActive");
    }

    #[tokio::test]
    async fn scenario_6_exemption_allows_regardless_of_used() {
        let now = chrono::Utc::now();
        let (engine, exemptions) = engine(now);
        exemptions
            .create(crate::exemption::NewExemption {
                namespace: "prod".to_string(),
                resource_name: None,
                duration_minutes: 60,
                reason: "incident".to_string(),
                approved_by: "alice".to_string(),
            })
            .await
            .unwrap();
        let mut policy = Policy::default();
        policy.freeze_enabled = true;
        let response = engine.decide(base_request("Deployment", "prod"), policy, false).await;
        assert!(response.allowed);
    }

    #[tokio::test]
    async fn unmonitored_kind_allows_without_running_later_stages() {
        let (engine, _) = engine(chrono::Utc::now());
        let mut policy = Policy::default();
        policy.freeze_enabled = true;
        let response = engine.decide(base_request("ConfigMap", "prod"), policy, false).await;
        assert!(response.allowed);
    }

    #[tokio::test]
    async fn dry_run_invariant_never_denies() {
        let (engine, _) = engine(chrono::Utc::now());
        let mut policy = Policy::default();
        policy.freeze_enabled = true;
        policy.fail_closed = true;
        let mut request = base_request("Deployment", "prod");
        request.dry_run = json!(["All"]);
        let response = engine.decide(request, policy, false).await;
        assert!(response.allowed);
    }

    struct DateTimeHelper;
    impl DateTimeHelper {
        fn t(s: &str) -> chrono::DateTime<chrono::Utc> {
            chrono::DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&chrono::Utc)
        }
    }
}
