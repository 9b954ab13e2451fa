//! Pure, synchronous bypass evaluation. Temporary exemption lookup is a
//! separate, async concern handled by the Admission Engine directly
//! against `ExemptionManager` — never here.

use freezegate_kernel::admission::AdmissionRequest;
use freezegate_kernel::model::Policy;

#[derive(Debug, Clone, PartialEq)]
pub struct BypassOutcome {
    pub allowed: bool,
    pub bypass_type: Option<&'static str>,
    pub reason: String,
}

impl BypassOutcome {
    fn denied(reason: impl Into<String>) -> Self {
        Self { allowed: false, bypass_type: None, reason: reason.into() }
    }
}

pub fn check_bypass(request: &AdmissionRequest, policy: &Policy) -> BypassOutcome {
    let annotation = check_annotation_bypass(request, policy);
    if annotation.allowed {
        return annotation;
    }
    let allowlist = check_user_allowlist(&request.user_info.username, &request.user_info.groups, policy);
    if allowlist.allowed {
        return allowlist;
    }
    BypassOutcome::denied("No bypass mechanism matched")
}

fn check_annotation_bypass(request: &AdmissionRequest, policy: &Policy) -> BypassOutcome {
    let key = &policy.bypass_annotation_key;
    let annotations = request.annotations();
    let bypass_value = annotations.get(key.as_str()).and_then(|v| v.as_str()).unwrap_or("");
    if !bypass_value.eq_ignore_ascii_case("true") {
        return BypassOutcome::denied("No bypass annotation found");
    }
    let reason_key = match key.rsplit_once('/') {
        Some((prefix, _)) => format!("{prefix}/emergency-reason"),
        None => format!("{key}/emergency-reason"),
    };
    let reason = annotations
        .get(reason_key.as_str())
        .and_then(|v| v.as_str())
        .unwrap_or("Emergency bypass annotation present");
    BypassOutcome {
        allowed: true,
        bypass_type: Some("annotation"),
        reason: format!("Annotation bypass: {reason}"),
    }
}

fn check_user_allowlist(username: &str, groups: &[String], policy: &Policy) -> BypassOutcome {
    if policy.bypass_allowed_users.is_empty() {
        return BypassOutcome::denied("No users in allowlist");
    }
    if policy.bypass_allowed_users.contains(username) {
        return BypassOutcome {
            allowed: true,
            bypass_type: Some("user"),
            reason: format!("User {username} is in bypass allowlist"),
        };
    }
    for group in groups {
        if policy.bypass_allowed_users.contains(group) {
            return BypassOutcome {
                allowed: true,
                bypass_type: Some("group"),
                reason: format!("Group {group} is in bypass allowlist"),
            };
        }
    }
    BypassOutcome::denied(format!("User {username} not in allowlist"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use freezegate_kernel::admission::{RequestKind, UserInfo};
    use serde_json::json;

    fn request_with_annotations(annotations: serde_json::Value) -> AdmissionRequest {
        AdmissionRequest {
            uid: "1".to_string(),
            kind: RequestKind { kind: "Deployment".to_string() },
            namespace: Some("prod".to_string()),
            name: "api".to_string(),
            operation: "UPDATE".to_string(),
            object: json!({"metadata": {"annotations": annotations}}),
            user_info: UserInfo { username: "bob".to_string(), groups: vec![] },
            dry_run: json!(false),
        }
    }

    #[test]
    fn annotation_bypass_wins_with_sibling_reason() {
        let req = request_with_annotations(json!({
            "admission-controller.io/emergency-bypass": "true",
            "admission-controller.io/emergency-reason": "hotfix",
        }));
        let policy = Policy::default();
        let outcome = check_bypass(&req, &policy);
        assert!(outcome.allowed);
        assert_eq!(outcome.bypass_type, Some("annotation"));
        assert!(outcome.reason.contains("hotfix"));
    }

    #[test]
    fn annotation_value_case_insensitive() {
        let req = request_with_annotations(json!({"admission-controller.io/emergency-bypass": "TRUE"}));
        let outcome = check_bypass(&req, &Policy::default());
        assert!(outcome.allowed);
    }

    #[test]
    fn user_allowlist_matches_username() {
        let req = request_with_annotations(json!({}));
        let mut policy = Policy::default();
        policy.bypass_allowed_users.insert("bob".to_string());
        let outcome = check_bypass(&req, &policy);
        assert!(outcome.allowed);
        assert_eq!(outcome.bypass_type, Some("user"));
    }

    #[test]
    fn group_allowlist_matches() {
        let mut req = request_with_annotations(json!({}));
        req.user_info.username = "carol".to_string();
        req.user_info.groups = vec!["sre".to_string()];
        let mut policy = Policy::default();
        policy.bypass_allowed_users.insert("sre".to_string());
        let outcome = check_bypass(&req, &policy);
        assert!(outcome.allowed);
        assert_eq!(outcome.bypass_type, Some("group"));
    }

    #[test]
    fn no_match_denies() {
        let req = request_with_annotations(json!({}));
        let outcome = check_bypass(&req, &Policy::default());
        assert!(!outcome.allowed);
    }
}
