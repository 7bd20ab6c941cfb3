//! Evaluation context for CEL conditions (spec.md §4.2).

use std::collections::BTreeMap;

use crate::types::{Principal, Resource};
use crate::value::{AttributeMap, Value};

/// Frozen per-evaluation context. `principal`/`resource` are exposed both as
/// spread attributes (`principal.department`) and nested under
/// `request.principal.attr.*`; `request.auxData.*`, `now`/`nowTimestamp` and
/// `variables.*` round out the bindings required by spec.md §4.2.
#[derive(Debug, Clone)]
pub struct EvalContext {
    pub principal_id: String,
    pub principal_roles: Vec<String>,
    pub principal_attrs: AttributeMap,
    pub resource_kind: String,
    pub resource_id: String,
    pub resource_attrs: AttributeMap,
    pub aux_data: AttributeMap,
    pub now_epoch_ms: i64,
    pub variables: BTreeMap<String, Value>,
}

impl EvalContext {
    pub fn for_check(
        principal: &Principal,
        resource: &Resource,
        aux_data: &AttributeMap,
        now_epoch_ms: Option<i64>,
        variables: &BTreeMap<String, Value>,
    ) -> Self {
        Self {
            principal_id: principal.id.clone(),
            principal_roles: principal.roles.iter().cloned().collect(),
            principal_attrs: principal.attributes.clone(),
            resource_kind: resource.kind.clone(),
            resource_id: resource.id.clone(),
            resource_attrs: resource.attributes.clone(),
            aux_data: aux_data.clone(),
            now_epoch_ms: now_epoch_ms.unwrap_or_else(now_millis),
            variables: variables.clone(),
        }
    }
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
