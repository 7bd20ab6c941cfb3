//! Request/response data model (spec.md §3.1).
//!
//! These are the shapes that cross the engine boundary: what a caller hands
//! to [`crate::engine::DecisionEngine::check`] and what comes back. Policy
//! shapes live in [`crate::policy`]; this module only has the principal,
//! resource, action-list request and the per-action decision response.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::value::{AttributeMap, Value};

/// The acting entity. `roles` are the principal's base roles; derived roles
/// are computed per-request by [`crate::derived_roles`] and never stored
/// here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub attributes: AttributeMap,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: BTreeSet::new(),
            attributes: AttributeMap::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// The object being acted upon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub attributes: AttributeMap,
}

impl Resource {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            attributes: AttributeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Principal/resource scope override for a single request (spec.md §4.4).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

/// `(principal, resource, actions, auxData, optional scope)`.
///
/// `actions` preserves caller order; `results` in the response are keyed by
/// the literal action string the caller provided (spec.md §3.1 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub principal: Principal,
    pub resource: Resource,
    pub actions: Vec<String>,
    #[serde(default)]
    pub aux_data: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<RequestScope>,
}

impl CheckRequest {
    pub fn new(principal: Principal, resource: Resource, actions: Vec<String>) -> Self {
        Self {
            request_id: None,
            principal,
            resource,
            actions,
            aux_data: BTreeMap::new(),
            scope: None,
        }
    }
}

/// Outcome of combining the principal and resource verdicts for one action
/// (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

/// The policy name used when no rule matched at all.
pub const DEFAULT_DENY_POLICY: &str = "default-deny";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub effect: Effect,
    /// `"default-deny"` when no rule matched.
    pub policy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,
    #[serde(default)]
    pub effective_derived_roles: BTreeSet<String>,
}

impl ActionResult {
    pub fn default_deny() -> Self {
        Self {
            effect: Effect::Deny,
            policy: DEFAULT_DENY_POLICY.to_string(),
            matched_rule: None,
            effective_derived_roles: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub evaluation_duration_ms: f64,
    /// Multiset of policy names that produced a non-default result for at
    /// least one action (spec.md §9 open question resolution) — policies
    /// scanned but fully unmatched are not included.
    pub policies_evaluated: Vec<String>,
}

/// Present only for scoped requests (spec.md §3.1, populated by
/// `checkWithScope`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeResolution {
    pub effective_scope: String,
    pub inheritance_chain: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoped_policy_matched: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub request_id: String,
    pub results: BTreeMap<String, ActionResult>,
    pub meta: ResponseMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_resolution: Option<ScopeResolution>,
}
