//! C4: two-phase policy parsing (spec.md §4.9).
//!
//! Phase one turns YAML/JSON source into the untyped envelope
//! `{ apiVersion, kind, metadata, spec }`; phase two walks `spec` as a
//! `serde_json::Value` tree and runs the semantic checks spec.md §4.9
//! enumerates, attaching a JSON-ish path and (when a close lexical match
//! exists) a suggestion to every failure before converting into the typed
//! policy shapes in [`super::types`].

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::cel::Engine as CelEngine;
use crate::derived_roles::{DerivedRolesPolicy, RoleDefinition};
use crate::error::{AuthzError, PathError, PolicyParseError, Result};
use crate::types::Effect;
use crate::value::Value;

use super::types::{
    ExportConstantsPolicy, ExportVariablesPolicy, LoadedPolicy, PolicyMetadata, PolicyVariables,
    PrincipalPolicy, PrincipalPolicyAction, PrincipalPolicyRule, ResourcePolicy, Rule,
};

const EXPECTED_API_VERSION: &str = "authz.engine/v1";
const RESERVED_WORDS: &[&str] = &["true", "false", "null", "undefined", "NaN"];
const VALID_KINDS: &[&str] = &[
    "ResourcePolicy",
    "DerivedRoles",
    "PrincipalPolicy",
    "ExportVariables",
    "ExportConstants",
];

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
    metadata: PolicyMetadata,
    spec: JsonValue,
}

pub fn parse_yaml(src: &str) -> Result<LoadedPolicy> {
    parse_yaml_with_warnings(src).map(|(policy, _warnings)| policy)
}

pub fn parse_json(src: &str) -> Result<LoadedPolicy> {
    parse_json_with_warnings(src).map(|(policy, _warnings)| policy)
}

/// Like [`parse_yaml`], but also returns the non-fatal validation warnings
/// spec.md §3.2/§4.9 call for (e.g. a rule with neither `roles` nor
/// `derivedRoles`, which is legal but applies to every principal).
pub fn parse_yaml_with_warnings(src: &str) -> Result<(LoadedPolicy, Vec<PathError>)> {
    let raw: RawDocument = serde_yaml::from_str(src).map_err(|e| {
        AuthzError::Parse(PolicyParseError::single(
            "failed to parse YAML document",
            PathError::new("$", e.to_string()),
        ))
    })?;
    parse_raw(raw, Some(src))
}

/// Like [`parse_json`], but also returns non-fatal validation warnings.
pub fn parse_json_with_warnings(src: &str) -> Result<(LoadedPolicy, Vec<PathError>)> {
    let raw: RawDocument = serde_json::from_str(src).map_err(|e| {
        AuthzError::Parse(PolicyParseError::single(
            "failed to parse JSON document",
            PathError::new("$", e.to_string()),
        ))
    })?;
    parse_raw(raw, Some(src))
}

fn parse_raw(raw: RawDocument, source: Option<&str>) -> Result<(LoadedPolicy, Vec<PathError>)> {
    let mut errors: Vec<PathError> = Vec::new();
    let mut warnings: Vec<PathError> = Vec::new();

    if raw.api_version != EXPECTED_API_VERSION {
        errors.push(
            PathError::new("apiVersion", format!("unsupported apiVersion '{}'", raw.api_version))
                .with_suggestion(EXPECTED_API_VERSION),
        );
    }
    validate_policy_name("metadata.name", &raw.metadata.name, &mut errors);

    let loaded = match raw.kind.as_str() {
        "ResourcePolicy" => {
            parse_resource_policy(raw.metadata, &raw.spec, &mut errors, &mut warnings).map(LoadedPolicy::Resource)
        }
        "DerivedRoles" => parse_derived_roles(raw.metadata, &raw.spec, &mut errors).map(LoadedPolicy::DerivedRoles),
        "PrincipalPolicy" => {
            parse_principal_policy(raw.metadata, &raw.spec, &mut errors).map(LoadedPolicy::Principal)
        }
        "ExportVariables" => {
            parse_export_variables(raw.metadata, &raw.spec, &mut errors).map(LoadedPolicy::ExportVariables)
        }
        "ExportConstants" => {
            parse_export_constants(raw.metadata, &raw.spec, &mut errors).map(LoadedPolicy::ExportConstants)
        }
        other => {
            errors.push(
                PathError::new("kind", format!("unknown policy kind '{}'", other))
                    .with_suggestion(suggest(other, VALID_KINDS).unwrap_or_else(|| "ResourcePolicy".to_string())),
            );
            None
        }
    };

    if !errors.is_empty() {
        let mut err = PolicyParseError::many("policy validation failed", errors);
        if let Some(src) = source {
            err = err.with_source(src.to_string());
        }
        return Err(AuthzError::Parse(err));
    }

    loaded
        .map(|l| (l, warnings))
        .ok_or_else(|| AuthzError::Internal("policy parsed with no errors but no value".to_string()))
}

fn parse_resource_policy(
    metadata: PolicyMetadata,
    spec: &JsonValue,
    errors: &mut Vec<PathError>,
    warnings: &mut Vec<PathError>,
) -> Option<ResourcePolicy> {
    let resource = require_str(spec, "resource", "spec.resource", errors)?.to_string();

    let rules_json = match spec.get("rules").and_then(JsonValue::as_array) {
        Some(r) => r,
        None => {
            errors.push(PathError::new("spec.rules", "missing required field 'rules'"));
            return None;
        }
    };
    if rules_json.is_empty() {
        errors.push(PathError::new("spec.rules", "'rules' must not be empty"));
    }

    let cel = CelEngine::new();
    let mut rules = Vec::with_capacity(rules_json.len());
    for (i, rule_json) in rules_json.iter().enumerate() {
        let path = format!("spec.rules[{}]", i);
        if let Some(rule) = parse_rule(rule_json, &path, &cel, errors) {
            if rule.roles.is_empty() && rule.derived_roles.is_empty() {
                warnings.push(PathError::new(
                    path,
                    "rule has neither 'roles' nor 'derivedRoles' and applies to every principal",
                ));
            }
            rules.push(rule);
        }
    }

    let variables = spec
        .get("variables")
        .map(|v| parse_policy_variables(v, "spec.variables", errors));

    Some(ResourcePolicy {
        metadata,
        resource,
        rules,
        variables,
    })
}

fn parse_rule(rule_json: &JsonValue, path: &str, cel: &CelEngine, errors: &mut Vec<PathError>) -> Option<Rule> {
    let name = rule_json.get("name").and_then(JsonValue::as_str).map(str::to_string);

    let actions_json = rule_json.get("actions").and_then(JsonValue::as_array);
    let actions: Vec<String> = match actions_json {
        Some(a) if !a.is_empty() => a.iter().filter_map(JsonValue::as_str).map(str::to_string).collect(),
        Some(_) => {
            errors.push(PathError::new(format!("{}.actions", path), "'actions' must not be empty"));
            Vec::new()
        }
        None => {
            errors.push(PathError::new(format!("{}.actions", path), "missing required field 'actions'"));
            Vec::new()
        }
    };
    for (i, action) in actions.iter().enumerate() {
        validate_action_pattern(&format!("{}.actions[{}]", path, i), action, errors);
    }

    let effect = match rule_json.get("effect").and_then(JsonValue::as_str) {
        Some("allow") => Effect::Allow,
        Some("deny") => Effect::Deny,
        Some(other) => {
            errors.push(
                PathError::new(format!("{}.effect", path), format!("invalid effect '{}'", other))
                    .with_suggestion(suggest(other, &["allow", "deny"]).unwrap_or_else(|| "allow".to_string())),
            );
            Effect::Deny
        }
        None => {
            errors.push(PathError::new(format!("{}.effect", path), "missing required field 'effect'"));
            Effect::Deny
        }
    };

    let roles: BTreeSet<String> = rule_json
        .get("roles")
        .and_then(JsonValue::as_array)
        .map(|a| a.iter().filter_map(JsonValue::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    for role in &roles {
        validate_identifier(&format!("{}.roles", path), role, errors);
    }

    let derived_roles: BTreeSet<String> = rule_json
        .get("derivedRoles")
        .and_then(JsonValue::as_array)
        .map(|a| a.iter().filter_map(JsonValue::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    let condition = rule_json.get("condition").and_then(JsonValue::as_str).map(str::to_string);
    if let Some(cond) = &condition {
        if cond.is_empty() {
            errors.push(PathError::new(format!("{}.condition", path), "condition must not be empty"));
        } else if let Err(e) = cel.validate_expression(cond) {
            errors.push(PathError::new(format!("{}.condition", path), format!("invalid CEL syntax: {}", e)));
        }
    }

    Some(Rule {
        name,
        actions,
        effect,
        roles,
        derived_roles,
        condition,
    })
}

fn parse_policy_variables(value: &JsonValue, path: &str, errors: &mut Vec<PathError>) -> PolicyVariables {
    let import: Vec<String> = value
        .get("import")
        .and_then(JsonValue::as_array)
        .map(|a| a.iter().filter_map(JsonValue::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    let mut local = BTreeMap::new();
    if let Some(local_json) = value.get("local").and_then(JsonValue::as_object) {
        let cel = CelEngine::new();
        for (name, expr) in local_json {
            validate_identifier(&format!("{}.local", path), name, errors);
            if let Some(expr_str) = expr.as_str() {
                if let Err(e) = cel.validate_expression(expr_str) {
                    errors.push(PathError::new(
                        format!("{}.local.{}", path, name),
                        format!("invalid CEL syntax: {}", e),
                    ));
                }
                local.insert(name.clone(), expr_str.to_string());
            }
        }
    }

    PolicyVariables { import, local }
}

fn parse_derived_roles(
    metadata: PolicyMetadata,
    spec: &JsonValue,
    errors: &mut Vec<PathError>,
) -> Option<DerivedRolesPolicy> {
    let definitions_json = match spec.get("definitions").and_then(JsonValue::as_array) {
        Some(d) => d,
        None => {
            errors.push(PathError::new("spec.definitions", "missing required field 'definitions'"));
            return None;
        }
    };
    if definitions_json.is_empty() {
        errors.push(PathError::new("spec.definitions", "'definitions' must not be empty"));
    }

    let cel = CelEngine::new();
    let mut seen_names = BTreeSet::new();
    let mut definitions = Vec::with_capacity(definitions_json.len());

    for (i, def_json) in definitions_json.iter().enumerate() {
        let path = format!("spec.definitions[{}]", i);
        let name = match require_str(def_json, "name", &format!("{}.name", path), errors) {
            Some(n) => n.to_string(),
            None => continue,
        };
        validate_identifier(&format!("{}.name", path), &name, errors);
        if !seen_names.insert(name.clone()) {
            errors.push(PathError::new(
                format!("{}.name", path),
                format!("duplicate derived-role definition '{}'", name),
            ));
        }

        let parent_roles: Vec<String> = def_json
            .get("parentRoles")
            .and_then(JsonValue::as_array)
            .map(|a| a.iter().filter_map(JsonValue::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        if parent_roles.is_empty() {
            errors.push(PathError::new(format!("{}.parentRoles", path), "'parentRoles' must not be empty"));
        }

        let condition = require_str(def_json, "condition", &format!("{}.condition", path), errors)
            .map(str::to_string)
            .unwrap_or_default();
        if !condition.is_empty() {
            if let Err(e) = cel.validate_expression(&condition) {
                errors.push(PathError::new(format!("{}.condition", path), format!("invalid CEL syntax: {}", e)));
            }
        }

        definitions.push(RoleDefinition::new(name, parent_roles, condition));
    }

    if crate::derived_roles::detect_cycle(&definitions).is_some() {
        errors.push(PathError::new("spec.definitions", "circular derived-role dependency detected"));
    }

    Some(DerivedRolesPolicy { metadata, definitions })
}

fn parse_principal_policy(
    metadata: PolicyMetadata,
    spec: &JsonValue,
    errors: &mut Vec<PathError>,
) -> Option<PrincipalPolicy> {
    let principal = require_str(spec, "principal", "spec.principal", errors)?.to_string();

    let rules_json = spec.get("rules").and_then(JsonValue::as_array).cloned().unwrap_or_default();
    let mut rules = Vec::with_capacity(rules_json.len());

    for (i, rule_json) in rules_json.iter().enumerate() {
        let path = format!("spec.rules[{}]", i);
        let resource = match require_str(rule_json, "resource", &format!("{}.resource", path), errors) {
            Some(r) => r.to_string(),
            None => continue,
        };

        let actions_json = rule_json.get("actions").and_then(JsonValue::as_array);
        let mut actions = Vec::new();
        match actions_json {
            Some(a) if !a.is_empty() => {
                for (j, action_json) in a.iter().enumerate() {
                    let action_path = format!("{}.actions[{}]", path, j);
                    let action = match action_json.get("action").and_then(JsonValue::as_str) {
                        Some(s) => s.to_string(),
                        None => {
                            errors.push(PathError::new(format!("{}.action", action_path), "missing 'action'"));
                            continue;
                        }
                    };
                    validate_action_pattern(&format!("{}.action", action_path), &action, errors);
                    let effect = match action_json.get("effect").and_then(JsonValue::as_str) {
                        Some("allow") => Effect::Allow,
                        Some("deny") => Effect::Deny,
                        Some(other) => {
                            errors.push(PathError::new(
                                format!("{}.effect", action_path),
                                format!("invalid effect '{}'", other),
                            ));
                            Effect::Deny
                        }
                        None => {
                            errors.push(PathError::new(format!("{}.effect", action_path), "missing 'effect'"));
                            Effect::Deny
                        }
                    };
                    actions.push(PrincipalPolicyAction { action, effect });
                }
            }
            _ => errors.push(PathError::new(format!("{}.actions", path), "'actions' must not be empty")),
        }

        let condition = rule_json.get("condition").and_then(JsonValue::as_str).map(str::to_string);
        rules.push(PrincipalPolicyRule { resource, actions, condition });
    }

    Some(PrincipalPolicy { metadata, principal, rules })
}

fn parse_export_variables(
    metadata: PolicyMetadata,
    spec: &JsonValue,
    errors: &mut Vec<PathError>,
) -> Option<ExportVariablesPolicy> {
    let definitions = parse_export_definitions(spec, "spec.definitions", errors, |v| v.as_str().map(str::to_string));
    if definitions.len() > 100 {
        errors.push(PathError::new("spec.definitions", "at most 100 definitions are permitted"));
    }
    let cel = CelEngine::new();
    for (name, expr) in &definitions {
        if let Err(e) = cel.validate_expression(expr) {
            errors.push(PathError::new(
                format!("spec.definitions.{}", name),
                format!("invalid CEL syntax: {}", e),
            ));
        }
    }
    Some(ExportVariablesPolicy { metadata, definitions })
}

fn parse_export_constants(
    metadata: PolicyMetadata,
    spec: &JsonValue,
    errors: &mut Vec<PathError>,
) -> Option<ExportConstantsPolicy> {
    let definitions = parse_export_definitions(spec, "spec.definitions", errors, |v| Some(Value::from(v.clone())));
    if definitions.len() > 100 {
        errors.push(PathError::new("spec.definitions", "at most 100 definitions are permitted"));
    }
    Some(ExportConstantsPolicy { metadata, definitions })
}

fn parse_export_definitions<T>(
    spec: &JsonValue,
    path: &str,
    errors: &mut Vec<PathError>,
    convert: impl Fn(&JsonValue) -> Option<T>,
) -> BTreeMap<String, T> {
    let mut out = BTreeMap::new();
    match spec.get("definitions").and_then(JsonValue::as_object) {
        Some(obj) => {
            for (name, value) in obj {
                validate_identifier(path, name, errors);
                if let Some(v) = convert(value) {
                    out.insert(name.clone(), v);
                }
            }
        }
        None => errors.push(PathError::new(path, "missing required field 'definitions'")),
    }
    out
}

fn require_str<'a>(value: &'a JsonValue, field: &str, path: &str, errors: &mut Vec<PathError>) -> Option<&'a str> {
    match value.get(field).and_then(JsonValue::as_str) {
        Some(s) if !s.is_empty() => Some(s),
        _ => {
            errors.push(PathError::new(path, format!("missing or empty required field '{}'", field)));
            None
        }
    }
}

fn identifier_regex() -> Regex {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex")
}

fn policy_name_regex() -> Regex {
    Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex")
}

fn action_segment_regex() -> Regex {
    Regex::new(r"^([A-Za-z0-9_]+|\*)$").expect("static regex")
}

fn validate_identifier(path: &str, value: &str, errors: &mut Vec<PathError>) {
    if !identifier_regex().is_match(value) {
        errors.push(PathError::new(path, format!("'{}' is not a valid identifier", value)));
        return;
    }
    if RESERVED_WORDS.contains(&value) {
        errors.push(PathError::new(path, format!("'{}' is a reserved keyword", value)));
    }
}

fn validate_policy_name(path: &str, value: &str, errors: &mut Vec<PathError>) {
    if value.is_empty() || !policy_name_regex().is_match(value) {
        errors.push(PathError::new(path, format!("'{}' is not a valid policy name", value)));
    }
}

fn validate_action_pattern(path: &str, value: &str, errors: &mut Vec<PathError>) {
    if value.is_empty() {
        errors.push(PathError::new(path, "action pattern must not be empty"));
        return;
    }
    let segments: Vec<&str> = value.split(':').collect();
    for (i, segment) in segments.iter().enumerate() {
        let is_trailing_wildcard = *segment == "*" && i == segments.len() - 1;
        if segment.is_empty() && !is_trailing_wildcard {
            errors.push(PathError::new(path, format!("action pattern '{}' has an empty segment", value)));
            return;
        }
        if !action_segment_regex().is_match(segment) {
            errors.push(PathError::new(
                path,
                format!("action pattern '{}' has an illegal segment '{}'", value, segment),
            ));
            return;
        }
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for i in 1..=a.len() {
        let mut prev = row[0];
        row[0] = i;
        for j in 1..=b.len() {
            let tmp = row[j];
            row[j] = if a[i - 1] == b[j - 1] {
                prev
            } else {
                1 + prev.min(row[j]).min(row[j - 1])
            };
            prev = tmp;
        }
    }
    row[b.len()]
}

fn suggest(value: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(value, c)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(c, _)| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_distance_is_symmetric_and_zero_for_equal_strings() {
        assert_eq!(levenshtein("allow", "allow"), 0);
        assert_eq!(levenshtein("alow", "allow"), levenshtein("allow", "alow"));
        assert_eq!(levenshtein("alow", "allow"), 1);
    }

    #[test]
    fn suggest_finds_close_match_within_threshold() {
        assert_eq!(suggest("alow", &["allow", "deny"]), Some("allow".to_string()));
        assert_eq!(suggest("completely-different", &["allow", "deny"]), None);
    }

    #[test]
    fn parses_minimal_resource_policy_from_yaml() {
        let yaml = r#"
apiVersion: authz.engine/v1
kind: ResourcePolicy
metadata:
  name: document-policy
spec:
  resource: document
  rules:
    - actions: ["read"]
      effect: allow
      roles: ["user"]
"#;
        let loaded = parse_yaml(yaml).unwrap();
        match loaded {
            LoadedPolicy::Resource(p) => {
                assert_eq!(p.resource, "document");
                assert_eq!(p.rules.len(), 1);
                assert_eq!(p.rules[0].effect, Effect::Allow);
            }
            _ => panic!("expected ResourcePolicy"),
        }
    }

    #[test]
    fn rejects_empty_rules_array() {
        let yaml = r#"
apiVersion: authz.engine/v1
kind: ResourcePolicy
metadata:
  name: document-policy
spec:
  resource: document
  rules: []
"#;
        let err = parse_yaml(yaml).unwrap_err();
        match err {
            AuthzError::Parse(e) => assert!(e.errors.iter().any(|p| p.path == "spec.rules")),
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn rejects_invalid_effect_with_suggestion() {
        let yaml = r#"
apiVersion: authz.engine/v1
kind: ResourcePolicy
metadata:
  name: document-policy
spec:
  resource: document
  rules:
    - actions: ["read"]
      effect: maybe
"#;
        let err = parse_yaml(yaml).unwrap_err();
        match err {
            AuthzError::Parse(e) => {
                let effect_error = e.errors.iter().find(|p| p.path == "spec.rules[0].effect").unwrap();
                assert_eq!(effect_error.suggestion.as_deref(), Some("allow"));
            }
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn rejects_circular_derived_roles() {
        let yaml = r#"
apiVersion: authz.engine/v1
kind: DerivedRoles
metadata:
  name: cyclic-roles
spec:
  definitions:
    - name: a
      parentRoles: ["b"]
      condition: "true"
    - name: b
      parentRoles: ["a"]
      condition: "true"
"#;
        let err = parse_yaml(yaml).unwrap_err();
        match err {
            AuthzError::Parse(e) => assert!(e.errors.iter().any(|p| p.message.contains("circular"))),
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        let yaml = r#"
apiVersion: authz.engine/v1
kind: NotAKind
metadata:
  name: whatever
spec: {}
"#;
        assert!(parse_yaml(yaml).is_err());
    }

    #[test]
    fn rule_without_roles_or_derived_roles_warns_but_still_parses() {
        let yaml = r#"
apiVersion: authz.engine/v1
kind: ResourcePolicy
metadata:
  name: document-policy
spec:
  resource: document
  rules:
    - actions: ["read"]
      effect: allow
"#;
        let (loaded, warnings) = parse_yaml_with_warnings(yaml).unwrap();
        assert!(matches!(loaded, LoadedPolicy::Resource(_)));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].path, "spec.rules[0]");
    }

    #[test]
    fn rule_with_roles_does_not_warn() {
        let yaml = r#"
apiVersion: authz.engine/v1
kind: ResourcePolicy
metadata:
  name: document-policy
spec:
  resource: document
  rules:
    - actions: ["read"]
      effect: allow
      roles: ["user"]
"#;
        let (_, warnings) = parse_yaml_with_warnings(yaml).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn accepts_json_identical_to_yaml() {
        let yaml = r#"
apiVersion: authz.engine/v1
kind: ResourcePolicy
metadata:
  name: document-policy
spec:
  resource: document
  rules:
    - actions: ["read"]
      effect: allow
"#;
        let json = r#"{
  "apiVersion": "authz.engine/v1",
  "kind": "ResourcePolicy",
  "metadata": {"name": "document-policy"},
  "spec": {
    "resource": "document",
    "rules": [{"actions": ["read"], "effect": "allow"}]
  }
}"#;
        let from_yaml = parse_yaml(yaml).unwrap();
        let from_json = parse_json(json).unwrap();
        match (from_yaml, from_json) {
            (LoadedPolicy::Resource(a), LoadedPolicy::Resource(b)) => assert_eq!(a, b),
            _ => panic!("expected ResourcePolicy"),
        }
    }
}
