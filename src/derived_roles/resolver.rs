//! C6: derived-roles resolution (spec.md §4.6).

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::cel::{Engine as CelEngine, EvalContext};
use crate::types::{Principal, Resource};
use crate::value::AttributeMap;

use super::types::RoleDefinition;

/// A memo for [`DerivedRolesResolver::resolve`], keyed by
/// `(principalId, resourceKind, resourceId)` (spec.md §4.6).
///
/// The key does not cover `principal.roles`/attributes, `resource`
/// attributes, or `auxData` — all of which the derived-role conditions read
/// — so an instance must be scoped to a single `check` call and discarded
/// afterward. Reusing one across requests that happen to share an
/// id-triple but differ in attributes would replay the first request's
/// derived-role set onto the second.
#[derive(Default)]
pub struct DerivedRolesCache {
    entries: HashMap<(String, String, String), BTreeSet<String>>,
}

impl DerivedRolesCache {
    pub fn new() -> Self {
        Self::default()
    }
}

/// `resolve(principal, resource, auxData) -> set<string>`.
///
/// Evaluates every definition whose `parent_roles` admit (OR-matched via
/// [`crate::pattern::action_matches`]) the principal's current role set and
/// whose `condition` evaluates true.
pub struct DerivedRolesResolver;

impl DerivedRolesResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(
        &self,
        definitions: &[RoleDefinition],
        principal: &Principal,
        resource: &Resource,
        aux_data: &AttributeMap,
        cel: &CelEngine,
        cache: &mut DerivedRolesCache,
    ) -> BTreeSet<String> {
        let key = (
            principal.id.clone(),
            resource.kind.clone(),
            resource.id.clone(),
        );
        if let Some(cached) = cache.entries.get(&key) {
            return cached.clone();
        }

        let ctx = EvalContext::for_check(principal, resource, aux_data, None, &Default::default());

        let mut result = BTreeSet::new();
        for def in definitions {
            let admitted = def.parent_roles.iter().any(|pattern| {
                principal
                    .roles
                    .iter()
                    .any(|role| crate::pattern::action_matches(pattern, role))
            });
            if !admitted {
                continue;
            }
            if cel.evaluate_boolean(&def.condition, &ctx) {
                result.insert(def.name.clone());
            } else {
                debug!(role = %def.name, "derived role condition did not admit principal");
            }
        }

        cache.entries.insert(key, result.clone());
        result
    }
}

impl Default for DerivedRolesResolver {
    fn default() -> Self {
        Self::new()
    }
}
