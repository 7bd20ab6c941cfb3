//! End-to-end decision scenarios exercising the full `check()` pipeline:
//! role resolution, scope matching, CEL evaluation, and deny-override
//! combining, against a real `PolicyStore` with no internals mocked out.

use std::collections::BTreeSet;
use std::sync::Arc;

use authz_core::derived_roles::{DerivedRolesPolicy, RoleDefinition};
use authz_core::policy::{PolicyMetadata, PrincipalPolicy, PrincipalPolicyAction, PrincipalPolicyRule, ResourcePolicy, Rule};
use authz_core::types::{CheckRequest, Effect, Principal, Resource, RequestScope};
use authz_core::{DecisionEngine, PolicyStore};

fn allow_rule(name: &str, actions: &[&str]) -> Rule {
    Rule {
        name: Some(name.to_string()),
        actions: actions.iter().map(|a| a.to_string()).collect(),
        effect: Effect::Allow,
        roles: BTreeSet::new(),
        derived_roles: BTreeSet::new(),
        condition: None,
    }
}

#[test]
fn s1_owner_allow_via_cel() {
    let store = Arc::new(PolicyStore::new());
    store
        .load_resource_policies(vec![ResourcePolicy {
            metadata: PolicyMetadata::new("document-policy"),
            resource: "document".to_string(),
            rules: vec![Rule {
                name: None,
                actions: vec!["read".to_string()],
                effect: Effect::Allow,
                roles: BTreeSet::new(),
                derived_roles: BTreeSet::new(),
                condition: Some("resource.ownerId == principal.id".to_string()),
            }],
            variables: None,
        }])
        .unwrap();

    let engine = DecisionEngine::new(store);
    let request = CheckRequest::new(
        Principal::new("u1").with_role("user"),
        Resource::new("document", "d1").with_attribute("ownerId", "u1"),
        vec!["read".to_string()],
    );
    let response = engine.check(request);
    assert_eq!(response.results["read"].effect, Effect::Allow);
    assert_eq!(response.results["read"].policy, "document-policy");
}

#[test]
fn s2_deny_overrides_allow() {
    let store = Arc::new(PolicyStore::new());
    let mut deny = allow_rule("deny-delete", &["delete"]);
    deny.effect = Effect::Deny;
    deny.roles = BTreeSet::from(["admin".to_string()]);
    let mut allow_all = allow_rule("allow-all", &["*"]);
    allow_all.roles = BTreeSet::from(["admin".to_string()]);

    store
        .load_resource_policies(vec![ResourcePolicy {
            metadata: PolicyMetadata::new("document-policy"),
            resource: "document".to_string(),
            rules: vec![allow_all, deny],
            variables: None,
        }])
        .unwrap();

    let engine = DecisionEngine::new(store);
    let request = CheckRequest::new(
        Principal::new("u1").with_role("admin"),
        Resource::new("document", "d1"),
        vec!["delete".to_string()],
    );
    let response = engine.check(request);
    assert_eq!(response.results["delete"].effect, Effect::Deny);
    assert_eq!(response.results["delete"].matched_rule.as_deref(), Some("deny-delete"));
}

#[test]
fn s3_derived_role_gating() {
    let store = Arc::new(PolicyStore::new());
    store
        .load_derived_roles_policies(vec![DerivedRolesPolicy::new(
            "common-roles",
            vec![RoleDefinition::new("owner", vec!["user".to_string()], "resource.ownerId == principal.id")],
        )])
        .unwrap();
    store
        .load_resource_policies(vec![ResourcePolicy {
            metadata: PolicyMetadata::new("document-policy"),
            resource: "document".to_string(),
            rules: vec![Rule {
                name: Some("owner-edit".to_string()),
                actions: vec!["edit".to_string()],
                effect: Effect::Allow,
                roles: BTreeSet::new(),
                derived_roles: BTreeSet::from(["owner".to_string()]),
                condition: None,
            }],
            variables: None,
        }])
        .unwrap();

    let engine = DecisionEngine::new(store);

    let owned = engine.check(CheckRequest::new(
        Principal::new("u1").with_role("user"),
        Resource::new("document", "d1").with_attribute("ownerId", "u1"),
        vec!["edit".to_string()],
    ));
    assert_eq!(owned.results["edit"].effect, Effect::Allow);
    assert!(owned.results["edit"].effective_derived_roles.contains("owner"));

    let not_owned = engine.check(CheckRequest::new(
        Principal::new("u1").with_role("user"),
        Resource::new("document", "d1").with_attribute("ownerId", "someone-else"),
        vec!["edit".to_string()],
    ));
    assert_eq!(not_owned.results["edit"].effect, Effect::Deny);
    assert_eq!(not_owned.results["edit"].policy, authz_core::types::DEFAULT_DENY_POLICY);
    assert!(not_owned.results["edit"].effective_derived_roles.is_empty());
}

#[test]
fn s4_wildcard_action_matching() {
    let store = Arc::new(PolicyStore::new());
    let mut rule = allow_rule("doc-wildcard", &["doc:*"]);
    rule.roles = BTreeSet::from(["user".to_string()]);
    store
        .load_resource_policies(vec![ResourcePolicy {
            metadata: PolicyMetadata::new("document-policy"),
            resource: "document".to_string(),
            rules: vec![rule],
            variables: None,
        }])
        .unwrap();

    let engine = DecisionEngine::new(store);
    let request = CheckRequest::new(
        Principal::new("u1").with_role("user"),
        Resource::new("document", "d1"),
        vec!["doc:read".to_string(), "doc:meta:read".to_string(), "doc".to_string()],
    );
    let response = engine.check(request);
    assert_eq!(response.results["doc:read"].effect, Effect::Allow);
    assert_eq!(response.results["doc:meta:read"].effect, Effect::Allow);
    assert_eq!(response.results["doc"].effect, Effect::Deny);
}

#[test]
fn s5_scope_inheritance() {
    let store = Arc::new(PolicyStore::new());
    store
        .load_resource_policies(vec![
            ResourcePolicy {
                metadata: PolicyMetadata::new("acme-document-policy").with_scope("acme"),
                resource: "document".to_string(),
                rules: vec![allow_rule("acme-view", &["view"])],
                variables: None,
            },
            ResourcePolicy {
                metadata: PolicyMetadata::new("global-document-policy"),
                resource: "document".to_string(),
                rules: vec![allow_rule("global-edit", &["edit"])],
                variables: None,
            },
        ])
        .unwrap();

    let engine = DecisionEngine::new(store);
    let mut request = CheckRequest::new(
        Principal::new("u1").with_role("user"),
        Resource::new("document", "d1"),
        vec!["view".to_string(), "edit".to_string()],
    );
    request.scope = Some(RequestScope { principal: Some("acme.eng".to_string()), resource: None });

    let response = engine.check_with_scope(request);
    let resolution = response.scope_resolution.expect("scope resolution must be populated");
    assert_eq!(resolution.effective_scope, "acme.eng");
    assert_eq!(resolution.scoped_policy_matched.as_deref(), Some("acme"));
    assert_eq!(resolution.inheritance_chain, vec!["acme.eng".to_string(), "acme".to_string(), String::new()]);

    assert_eq!(response.results["view"].effect, Effect::Allow);
    assert_eq!(response.results["view"].policy, "acme-document-policy");
    assert_eq!(response.results["edit"].effect, Effect::Allow);
    assert_eq!(response.results["edit"].policy, "global-document-policy");
}

#[test]
fn s6_principal_deny_beats_resource_allow() {
    let store = Arc::new(PolicyStore::new());
    store
        .load_resource_policies(vec![ResourcePolicy {
            metadata: PolicyMetadata::new("document-policy"),
            resource: "document".to_string(),
            rules: vec![{
                let mut rule = allow_rule("user-view", &["view"]);
                rule.roles = BTreeSet::from(["user".to_string()]);
                rule
            }],
            variables: None,
        }])
        .unwrap();
    store.load_principal_policies(vec![PrincipalPolicy {
        metadata: PolicyMetadata::new("u1-overrides"),
        principal: "u1".to_string(),
        rules: vec![PrincipalPolicyRule {
            resource: "document".to_string(),
            actions: vec![PrincipalPolicyAction { action: "view".to_string(), effect: Effect::Deny }],
            condition: None,
        }],
    }]);

    let engine = DecisionEngine::new(store);
    let request = CheckRequest::new(
        Principal::new("u1").with_role("user"),
        Resource::new("document", "d1"),
        vec!["view".to_string()],
    );
    let response = engine.check(request);
    assert_eq!(response.results["view"].effect, Effect::Deny);
    assert_eq!(response.results["view"].policy, "u1-overrides");
}
