//! Internal verdict representation and the deny-override combining
//! algorithm (spec.md §4.8). These types never cross the engine boundary —
//! [`crate::types::ActionResult`] is what callers see.

use crate::types::Effect;

/// Outcome of scanning either the principal's or the resource's policies for
/// a single action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow { policy: String, rule: Option<String> },
    Deny { policy: String, rule: Option<String> },
    /// No rule matched at all.
    NoMatch,
}

impl Verdict {
    fn is_explicit_deny(&self) -> bool {
        matches!(self, Verdict::Deny { .. })
    }

    fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow { .. })
    }
}

/// `{ effect, policy, rule? }`, the combined outcome for one action
/// (spec.md §4.8's combining table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedVerdict {
    pub effect: Effect,
    pub policy: String,
    pub rule: Option<String>,
}

/// Deny-override: an explicit deny on either side always wins; an explicit
/// principal allow wins over a non-deny resource outcome; otherwise a
/// resource allow stands; absent any of those, the default deny applies.
pub fn combine(principal: Verdict, resource: Verdict) -> CombinedVerdict {
    if let Verdict::Deny { policy, rule } = principal.clone() {
        return CombinedVerdict { effect: Effect::Deny, policy, rule };
    }
    if let Verdict::Deny { policy, rule } = resource.clone() {
        return CombinedVerdict { effect: Effect::Deny, policy, rule };
    }
    if let Verdict::Allow { policy, rule } = principal {
        if !resource.is_explicit_deny() {
            return CombinedVerdict { effect: Effect::Allow, policy, rule };
        }
    }
    if resource.is_allow() {
        if let Verdict::Allow { policy, rule } = resource {
            return CombinedVerdict { effect: Effect::Allow, policy, rule };
        }
    }
    CombinedVerdict {
        effect: Effect::Deny,
        policy: crate::types::DEFAULT_DENY_POLICY.to_string(),
        rule: None,
    }
}
