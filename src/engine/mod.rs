//! C9: the decision engine orchestrating C1–C8 (spec.md §4.8, §6).

pub mod audit;
pub mod decision;
pub mod metrics;
pub mod principal;

pub use audit::{AuditLogger, DecisionEvent, NoopAuditLogger};
pub use metrics::{EngineMetrics, MetricsCollector};
pub use principal::PrincipalEvaluator;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::info_span;
use uuid::Uuid;

use crate::cel::{EvalContext, Engine as CelEngine};
use crate::derived_roles::{DerivedRolesPolicy, DerivedRolesResolver};
use crate::error::Result;
use crate::policy::{
    ExportConstantsPolicy, ExportVariablesPolicy, PolicyStore, PolicyStoreStats, PrincipalPolicy, ResourcePolicy,
};
use crate::scope::ScopeResolver;
use crate::types::{ActionResult, CheckRequest, CheckResponse, Effect, ResponseMeta, ScopeResolution};

use decision::{combine, Verdict};

/// Engine-wide configuration (spec.md §6, SPEC_FULL.md §2): constructed
/// explicitly and passed to [`DecisionEngine::with_config`] rather than
/// read from a global singleton (spec.md §9).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub audit_enabled: bool,
    /// C1 expression cache capacity (spec.md §4.1 default 1000).
    pub cel_cache_capacity: usize,
    /// C7 scope-chain cache capacity (spec.md §4.4 default 1000).
    pub scope_chain_cache_capacity: usize,
    /// C7 scope-chain cache TTL (spec.md §4.4 default 5 minutes).
    pub scope_chain_cache_ttl: std::time::Duration,
    /// Maximum scope depth (spec.md §3.3 default 10).
    pub max_scope_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audit_enabled: false,
            cel_cache_capacity: crate::cache::DEFAULT_CAPACITY,
            scope_chain_cache_capacity: crate::scope::resolver::DEFAULT_CHAIN_CACHE_CAPACITY,
            scope_chain_cache_ttl: crate::scope::resolver::DEFAULT_CHAIN_CACHE_TTL,
            max_scope_depth: crate::scope::DEFAULT_MAX_DEPTH,
        }
    }
}

/// `getStats() -> { resourcePolicies, derivedRolesPolicies, principalPolicies, resources }`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub resource_policies: usize,
    pub scoped_resource_policies: usize,
    pub derived_roles_policies: usize,
    pub principal_policies: usize,
    pub resources: usize,
}

impl From<PolicyStoreStats> for EngineStats {
    fn from(s: PolicyStoreStats) -> Self {
        Self {
            resource_policies: s.resource_policies,
            scoped_resource_policies: s.scoped_resource_policies,
            derived_roles_policies: s.derived_roles_policies,
            principal_policies: s.principal_policies,
            resources: s.resources,
        }
    }
}

/// Synchronous, thread-safe decision engine. No global singleton: callers
/// construct one per policy store and share it behind an `Arc` (spec.md §9).
pub struct DecisionEngine {
    policy_store: Arc<PolicyStore>,
    cel: CelEngine,
    derived_roles: DerivedRolesResolver,
    principal_evaluator: PrincipalEvaluator,
    scope_resolver: ScopeResolver,
    metrics: MetricsCollector,
    audit_logger: RwLock<Box<dyn AuditLogger>>,
    audit_enabled: AtomicBool,
    request_counter: AtomicU64,
}

impl DecisionEngine {
    pub fn new(policy_store: Arc<PolicyStore>) -> Self {
        Self::with_config(policy_store, EngineConfig::default())
    }

    pub fn with_config(policy_store: Arc<PolicyStore>, config: EngineConfig) -> Self {
        Self {
            policy_store,
            cel: CelEngine::with_capacity(config.cel_cache_capacity),
            derived_roles: DerivedRolesResolver::new(),
            principal_evaluator: PrincipalEvaluator::new(),
            scope_resolver: ScopeResolver::with_config(
                config.scope_chain_cache_capacity,
                config.scope_chain_cache_ttl,
                config.max_scope_depth,
            ),
            metrics: MetricsCollector::new(),
            audit_logger: RwLock::new(Box::new(NoopAuditLogger)),
            audit_enabled: AtomicBool::new(config.audit_enabled),
            request_counter: AtomicU64::new(0),
        }
    }

    pub fn policy_store(&self) -> &PolicyStore {
        &self.policy_store
    }

    pub fn set_audit_logger(&self, logger: Box<dyn AuditLogger>) {
        *self.audit_logger.write().expect("audit logger lock poisoned") = logger;
    }

    pub fn set_audit_enabled(&self, enabled: bool) {
        self.audit_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn clear_policies(&self) {
        self.policy_store.clear();
        self.cel.clear_cache();
        self.scope_resolver.clear_cache();
    }

    pub fn get_stats(&self) -> EngineStats {
        self.policy_store.stats().into()
    }

    pub fn metrics(&self) -> EngineMetrics {
        self.metrics.snapshot()
    }

    /// `loadResourcePolicies` (spec.md §6 Engine API) — forwards to the
    /// backing store so callers don't need to reach through `policy_store()`
    /// for the common load path.
    pub fn load_resource_policies(&self, policies: Vec<ResourcePolicy>) -> Result<()> {
        self.policy_store.load_resource_policies(policies)
    }

    pub fn load_derived_roles_policies(&self, policies: Vec<DerivedRolesPolicy>) -> Result<()> {
        self.policy_store.load_derived_roles_policies(policies)
    }

    pub fn load_principal_policies(&self, policies: Vec<PrincipalPolicy>) {
        self.policy_store.load_principal_policies(policies)
    }

    pub fn load_export_variables(&self, exports: Vec<ExportVariablesPolicy>) -> Result<()> {
        self.policy_store.load_export_variables(exports)
    }

    pub fn load_export_constants(&self, exports: Vec<ExportConstantsPolicy>) -> Result<()> {
        self.policy_store.load_export_constants(exports)
    }

    fn next_request_id(&self) -> String {
        let seq = self.request_counter.fetch_add(1, Ordering::Relaxed);
        format!("{:x}-{}", seq, Uuid::new_v4().simple())
    }

    /// `check(request) -> response` (spec.md §4.8).
    pub fn check(&self, request: CheckRequest) -> CheckResponse {
        self.check_internal(request, false)
    }

    /// `checkWithScope(request) -> scopedResponse`: identical algorithm, but
    /// always populates `scope_resolution` even when the request carries no
    /// explicit scope override.
    pub fn check_with_scope(&self, request: CheckRequest) -> CheckResponse {
        self.check_internal(request, true)
    }

    fn check_internal(&self, request: CheckRequest, force_scope: bool) -> CheckResponse {
        let start = Instant::now();
        let request_id = request.request_id.clone().unwrap_or_else(|| self.next_request_id());

        let root_span = info_span!(
            "authz.check",
            request_id = %request_id,
            principal_id = %request.principal.id,
            resource_kind = %request.resource.kind,
            resource_id = %request.resource.id,
            action_count = request.actions.len(),
        );
        let _root_guard = root_span.enter();

        let derived_roles = {
            let span = info_span!("authz.derived_roles");
            let _guard = span.enter();
            // A fresh memo per request: the key is only
            // (principalId, resourceKind, resourceId), so a cache shared
            // across requests could return a prior request's derived-role
            // set for the same id-triple with different attributes
            // (spec.md §4.6 permits memoization only within one request).
            let mut derived_roles_cache = crate::derived_roles::DerivedRolesCache::new();
            self.derived_roles.resolve(
                &self.policy_store.derived_role_definitions(),
                &request.principal,
                &request.resource,
                &request.aux_data,
                &self.cel,
                &mut derived_roles_cache,
            )
        };

        let scope_resolution = if force_scope || request.scope.is_some() {
            Some(self.resolve_scope(&request))
        } else {
            None
        };

        // Per action, a policy at a more specific scope takes precedence, but an
        // action left unmatched by it still falls through to its ancestors and
        // finally the global policy set (spec.md §4.4, §8.4 scenario S5) — so the
        // candidate list is the whole chain in specificity order, not just the
        // single scope `find_matching_scope` reports as the provenance match.
        let candidate_policies: Vec<Arc<ResourcePolicy>> = match &scope_resolution {
            Some(resolution) => {
                let mut policies = Vec::new();
                for scope in &resolution.inheritance_chain {
                    if scope.is_empty() {
                        policies.extend(self.policy_store.resource_policies(&request.resource.kind));
                    } else if let Some(scoped) = self.policy_store.scoped_resource_policies(scope, &request.resource.kind) {
                        policies.extend(scoped);
                    }
                }
                policies
            }
            None => self.policy_store.resource_policies(&request.resource.kind),
        };

        let principal_policies = self.policy_store.principal_policies(&request.principal.id);

        let mut all_roles: BTreeSet<String> = request.principal.roles.clone();
        all_roles.extend(derived_roles.iter().cloned());

        let mut results = BTreeMap::new();
        let mut policies_evaluated: Vec<String> = Vec::new();

        for action in &request.actions {
            let ctx = EvalContext::for_check(
                &request.principal,
                &request.resource,
                &request.aux_data,
                None,
                &Default::default(),
            );

            let principal_verdict = {
                let span = info_span!("authz.policy_match", phase = "principal");
                let _guard = span.enter();
                self.principal_evaluator.evaluate(
                    &principal_policies,
                    &request.resource.kind,
                    action,
                    &ctx,
                    &self.cel,
                )
            };

            let (resource_verdict, touched) = {
                let span = info_span!("authz.policy_match", phase = "resource");
                let _guard = span.enter();
                self.evaluate_resource_policies(&candidate_policies, action, &derived_roles, &all_roles, &ctx)
            };

            let principal_policy_name = match &principal_verdict {
                Verdict::Allow { policy, .. } | Verdict::Deny { policy, .. } => Some(policy.clone()),
                Verdict::NoMatch => None,
            };

            for name in principal_policy_name.into_iter().chain(touched) {
                if !policies_evaluated.contains(&name) {
                    policies_evaluated.push(name);
                }
            }

            let combined = combine(principal_verdict, resource_verdict);
            results.insert(
                action.clone(),
                ActionResult {
                    effect: combined.effect,
                    policy: combined.policy,
                    matched_rule: combined.rule,
                    effective_derived_roles: derived_roles.clone(),
                },
            );
        }

        let duration = start.elapsed();
        let allowed_any = results.values().any(|r| r.effect == Effect::Allow);
        self.metrics.record_decision(allowed_any, duration);

        let meta = ResponseMeta {
            evaluation_duration_ms: duration.as_secs_f64() * 1000.0,
            policies_evaluated,
        };

        if self.audit_enabled.load(Ordering::Relaxed) {
            let event = DecisionEvent::from_request(&request, &request_id, results.clone(), meta.clone());
            self.audit_logger
                .read()
                .expect("audit logger lock poisoned")
                .log(&event);
        }

        CheckResponse {
            request_id,
            results,
            meta,
            scope_resolution,
        }
    }

    /// Resolves a `ResourcePolicy`'s imported/local variables (C5) against
    /// the request's base context and evaluates each variable expression in
    /// declaration order, so a later variable may reference an earlier one.
    /// A variable whose expression errors is simply omitted from the
    /// bindings rather than aborting the rule scan — consistent with this
    /// engine's fail-closed treatment of expression errors elsewhere.
    fn resolve_condition_variables(
        &self,
        policy_variables: &crate::policy::PolicyVariables,
        base_ctx: &EvalContext,
    ) -> BTreeMap<String, crate::value::Value> {
        let resolved = match crate::variables::resolve(policy_variables, &self.policy_store) {
            Ok(r) => r,
            Err(_) => return BTreeMap::new(),
        };
        let mut values = resolved.constants;
        for (name, expr) in &resolved.variables {
            let ctx = EvalContext { variables: values.clone(), ..base_ctx.clone() };
            if let Some(value) = self.cel.evaluate(expr, &ctx).value {
                values.insert(name.clone(), value);
            }
        }
        values
    }

    /// Per-action scan of the candidate resource policies (spec.md §4.8 step 5b).
    fn evaluate_resource_policies(
        &self,
        policies: &[Arc<ResourcePolicy>],
        action: &str,
        derived_roles: &BTreeSet<String>,
        all_roles: &BTreeSet<String>,
        ctx: &EvalContext,
    ) -> (Verdict, Vec<String>) {
        let mut touched = Vec::new();
        let mut running_allow: Option<(String, Option<String>)> = None;

        for policy in policies {
            let policy_ctx;
            let effective_ctx: &EvalContext = match &policy.variables {
                Some(vars) => {
                    policy_ctx = EvalContext {
                        variables: self.resolve_condition_variables(vars, ctx),
                        ..ctx.clone()
                    };
                    &policy_ctx
                }
                None => ctx,
            };

            let mut policy_touched = false;
            for rule in &policy.rules {
                if !rule
                    .actions
                    .iter()
                    .any(|pattern| crate::pattern::action_matches(pattern, action))
                {
                    continue;
                }
                if !rule.roles.is_empty() && !rule.roles.iter().any(|r| all_roles.contains(r)) {
                    continue;
                }
                if !rule.derived_roles.is_empty() && !rule.derived_roles.iter().any(|r| derived_roles.contains(r)) {
                    continue;
                }
                if let Some(condition) = &rule.condition {
                    let cel_span = info_span!("authz.cel_evaluate");
                    let _guard = cel_span.enter();
                    if !self.cel.evaluate_boolean(condition, effective_ctx) {
                        continue;
                    }
                }

                policy_touched = true;
                match rule.effect {
                    Effect::Deny => {
                        touched.push(policy.metadata.name.clone());
                        return (
                            Verdict::Deny { policy: policy.metadata.name.clone(), rule: rule.name.clone() },
                            touched,
                        );
                    }
                    Effect::Allow => {
                        running_allow = Some((policy.metadata.name.clone(), rule.name.clone()));
                    }
                }
            }
            if policy_touched {
                touched.push(policy.metadata.name.clone());
            }
        }

        match running_allow {
            Some((policy, rule)) => (Verdict::Allow { policy, rule }, touched),
            None => (Verdict::NoMatch, touched),
        }
    }

    fn resolve_scope(&self, request: &CheckRequest) -> ScopeResolution {
        let principal_scope = request.scope.as_ref().and_then(|s| s.principal.as_deref());
        let resource_scope = request.scope.as_ref().and_then(|s| s.resource.as_deref());
        let effective = self.scope_resolver.compute_effective_scope(principal_scope, resource_scope);
        let chain = self.scope_resolver.build_scope_chain(&effective);

        let kind = request.resource.kind.clone();
        let store = &self.policy_store;
        let (matched, reported) =
            crate::scope::find_matching_scope(&chain, |s| store.has_scoped_resource_policies(s, &kind));

        ScopeResolution {
            effective_scope: effective,
            inheritance_chain: reported,
            scoped_policy_matched: matched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::types::{PolicyMetadata, Rule};
    use crate::policy::ResourcePolicy;
    use crate::types::{Principal, Resource};
    use std::collections::BTreeSet;

    fn allow_rule(action: &str) -> Rule {
        Rule {
            name: Some(format!("allow-{}", action)),
            actions: vec![action.to_string()],
            effect: Effect::Allow,
            roles: BTreeSet::new(),
            derived_roles: BTreeSet::new(),
            condition: None,
        }
    }

    fn engine_with_resource_policy(rules: Vec<Rule>) -> DecisionEngine {
        let store = Arc::new(PolicyStore::new());
        store.load_resource_policies(vec![ResourcePolicy {
            metadata: PolicyMetadata::new("document-policy"),
            resource: "document".to_string(),
            rules,
            variables: None,
        }])
        .unwrap();
        DecisionEngine::new(store)
    }

    #[test]
    fn unmatched_action_defaults_to_deny() {
        let engine = engine_with_resource_policy(vec![allow_rule("read")]);
        let request = CheckRequest::new(Principal::new("u1"), Resource::new("document", "d1"), vec!["write".to_string()]);
        let response = engine.check(request);
        let result = &response.results["write"];
        assert_eq!(result.effect, Effect::Deny);
        assert_eq!(result.policy, crate::types::DEFAULT_DENY_POLICY);
    }

    #[test]
    fn matching_allow_rule_allows() {
        let engine = engine_with_resource_policy(vec![allow_rule("read")]);
        let request = CheckRequest::new(Principal::new("u1"), Resource::new("document", "d1"), vec!["read".to_string()]);
        let response = engine.check(request);
        assert_eq!(response.results["read"].effect, Effect::Allow);
        assert_eq!(response.results["read"].policy, "document-policy");
    }

    #[test]
    fn explicit_deny_overrides_allow() {
        let mut deny = allow_rule("read");
        deny.effect = Effect::Deny;
        deny.name = Some("deny-read".to_string());
        let engine = engine_with_resource_policy(vec![allow_rule("read"), deny]);
        let request = CheckRequest::new(Principal::new("u1"), Resource::new("document", "d1"), vec!["read".to_string()]);
        let response = engine.check(request);
        assert_eq!(response.results["read"].effect, Effect::Deny);
    }

    #[test]
    fn role_restricted_rule_requires_overlap() {
        let mut rule = allow_rule("read");
        rule.roles = BTreeSet::from(["admin".to_string()]);
        let engine = engine_with_resource_policy(vec![rule]);
        let request = CheckRequest::new(Principal::new("u1").with_role("user"), Resource::new("document", "d1"), vec!["read".to_string()]);
        let response = engine.check(request);
        assert_eq!(response.results["read"].effect, Effect::Deny);
    }

    #[test]
    fn clear_policies_resets_stats() {
        let engine = engine_with_resource_policy(vec![allow_rule("read")]);
        assert_eq!(engine.get_stats().resource_policies, 1);
        engine.clear_policies();
        assert_eq!(engine.get_stats().resource_policies, 0);
    }

    #[test]
    fn audit_logger_receives_event_when_enabled() {
        use std::sync::Mutex;

        struct Recorder(Mutex<usize>);
        impl AuditLogger for Recorder {
            fn log(&self, _event: &DecisionEvent) {
                *self.0.lock().unwrap() += 1;
            }
        }

        let engine = engine_with_resource_policy(vec![allow_rule("read")]);
        let recorder = Arc::new(Recorder(Mutex::new(0)));
        struct Forward(Arc<Recorder>);
        impl AuditLogger for Forward {
            fn log(&self, event: &DecisionEvent) {
                self.0.log(event);
            }
        }
        engine.set_audit_logger(Box::new(Forward(recorder.clone())));
        engine.set_audit_enabled(true);

        let request = CheckRequest::new(Principal::new("u1"), Resource::new("document", "d1"), vec!["read".to_string()]);
        engine.check(request);
        assert_eq!(*recorder.0.lock().unwrap(), 1);
    }

    #[test]
    fn request_id_is_preserved_when_caller_supplies_one() {
        let engine = engine_with_resource_policy(vec![allow_rule("read")]);
        let mut request = CheckRequest::new(Principal::new("u1"), Resource::new("document", "d1"), vec!["read".to_string()]);
        request.request_id = Some("caller-supplied".to_string());
        let response = engine.check(request);
        assert_eq!(response.request_id, "caller-supplied");
    }
}
