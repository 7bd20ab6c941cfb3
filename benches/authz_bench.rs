//! Hot-path benchmarks for the expression cache (C1), CEL evaluator (C2),
//! pattern matcher (C3), and the end-to-end `check()` call.

use std::collections::BTreeSet;
use std::sync::Arc;

use authz_core::cel::{EvalContext, Engine as CelEngine};
use authz_core::pattern::action_matches;
use authz_core::policy::{PolicyMetadata, ResourcePolicy, Rule};
use authz_core::types::{CheckRequest, Effect, Principal, Resource};
use authz_core::{DecisionEngine, PolicyStore};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_cel_evaluation(c: &mut Criterion) {
    let engine = CelEngine::new();
    let principal = Principal::new("u1").with_role("user");
    let resource = Resource::new("document", "d1").with_attribute("ownerId", "u1");
    let ctx = EvalContext::for_check(&principal, &resource, &Default::default(), Some(0), &Default::default());

    let mut group = c.benchmark_group("cel_evaluate");
    group.bench_function("cache_cold_per_call", |b| {
        b.iter(|| {
            let engine = CelEngine::new();
            black_box(engine.evaluate_boolean("resource.ownerId == principal.id", &ctx));
        });
    });
    group.bench_function("cache_warm", |b| {
        engine.evaluate_boolean("resource.ownerId == principal.id", &ctx);
        b.iter(|| black_box(engine.evaluate_boolean("resource.ownerId == principal.id", &ctx)));
    });
    group.finish();
}

fn bench_pattern_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_match");
    group.bench_function("exact", |b| b.iter(|| black_box(action_matches("read", "read"))));
    group.bench_function("trailing_wildcard", |b| {
        b.iter(|| black_box(action_matches("doc:*", "doc:meta:read")))
    });
    group.bench_function("bare_wildcard", |b| b.iter(|| black_box(action_matches("*", "read"))));
    group.finish();
}

fn engine_with_policies(count: usize) -> DecisionEngine {
    let store = Arc::new(PolicyStore::new());
    let rules: Vec<Rule> = (0..count)
        .map(|i| Rule {
            name: Some(format!("rule-{i}")),
            actions: vec!["read".to_string()],
            effect: if i % 5 == 0 { Effect::Deny } else { Effect::Allow },
            roles: BTreeSet::from([format!("role-{}", i % 10)]),
            derived_roles: BTreeSet::new(),
            condition: Some("resource.ownerId == principal.id".to_string()),
        })
        .collect();
    store
        .load_resource_policies(vec![ResourcePolicy {
            metadata: PolicyMetadata::new("document-policy"),
            resource: "document".to_string(),
            rules,
            variables: None,
        }])
        .unwrap();
    DecisionEngine::new(store)
}

fn bench_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("authorization_check");
    for rule_count in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("rules", rule_count), &rule_count, |b, &count| {
            let engine = engine_with_policies(count);
            let principal = Principal::new("u1").with_role("role-0");
            let resource = Resource::new("document", "d1").with_attribute("ownerId", "u1");
            b.iter(|| {
                let request = CheckRequest::new(principal.clone(), resource.clone(), vec!["read".to_string()]);
                black_box(engine.check(request));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cel_evaluation, bench_pattern_matching, bench_check);
criterion_main!(benches);
