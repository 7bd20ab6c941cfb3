//! C8: principal-policy evaluator (spec.md §4.7).
//!
//! Total principal policies loaded (spec.md §4.7's "Stats exposed") is
//! surfaced via [`super::EngineStats::principal_policies`], which reads the
//! authoritative count straight off [`crate::policy::PolicyStore`] — the
//! store is the source of truth for what's loaded, so this evaluator
//! doesn't keep its own shadow counter.

use crate::cel::{EvalContext, Engine as CelEngine};
use crate::policy::PrincipalPolicy;

use super::decision::Verdict;

/// For a single action, scans the principal's loaded policies in load order
/// and each rule in declaration order. The first matching `deny` wins;
/// otherwise the first matching `allow`; otherwise no verdict.
pub struct PrincipalEvaluator;

impl PrincipalEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        policies: &[std::sync::Arc<PrincipalPolicy>],
        resource_kind: &str,
        action: &str,
        ctx: &EvalContext,
        cel: &CelEngine,
    ) -> Verdict {
        let mut running_allow: Option<Verdict> = None;
        for policy in policies {
            for rule in &policy.rules {
                if !crate::pattern::action_matches(&rule.resource, resource_kind) {
                    continue;
                }
                for entry in &rule.actions {
                    if !crate::pattern::action_matches(&entry.action, action) {
                        continue;
                    }
                    if let Some(condition) = &rule.condition {
                        if !cel.evaluate_boolean(condition, ctx) {
                            continue;
                        }
                    }
                    match entry.effect {
                        // The first matching deny wins outright; any allow seen
                        // earlier is discarded since deny always dominates.
                        crate::types::Effect::Deny => {
                            return Verdict::Deny {
                                policy: policy.metadata.name.clone(),
                                rule: rule_label(rule, &entry.action),
                            };
                        }
                        // Keep the first allow but keep scanning in case a
                        // later rule denies.
                        crate::types::Effect::Allow => {
                            if running_allow.is_none() {
                                running_allow = Some(Verdict::Allow {
                                    policy: policy.metadata.name.clone(),
                                    rule: rule_label(rule, &entry.action),
                                });
                            }
                        }
                    }
                }
            }
        }
        running_allow.unwrap_or(Verdict::NoMatch)
    }
}

fn rule_label(rule: &crate::policy::PrincipalPolicyRule, action: &str) -> Option<String> {
    Some(format!("{}:{}", rule.resource, action))
}

impl Default for PrincipalEvaluator {
    fn default() -> Self {
        Self::new()
    }
}
