//! Policy schema (spec.md §3.2): the validated, typed form every parsed
//! policy document is converted into by [`super::parser`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::Effect;
use crate::value::Value;

/// Metadata shared by all five policy kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl PolicyMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// A pattern over `:`-delimited action segments, matched via
/// [`crate::pattern::action_matches`].
pub type ActionPattern = String;

/// A single rule inside a [`ResourcePolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub actions: Vec<ActionPattern>,
    pub effect: Effect,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub derived_roles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// `ResourcePolicy = { resource, rules, variables? }` (spec.md §3.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePolicy {
    pub metadata: PolicyMetadata,
    pub resource: String,
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<PolicyVariables>,
}

/// One `{ action, effect }` pair inside a principal-policy rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalPolicyAction {
    pub action: ActionPattern,
    pub effect: Effect,
}

/// `{ resource, actions: [{action, effect}], condition? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalPolicyRule {
    pub resource: String,
    pub actions: Vec<PrincipalPolicyAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// `PrincipalPolicy = { principal, rules }` (spec.md §3.2, §4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalPolicy {
    pub metadata: PolicyMetadata,
    pub principal: String,
    pub rules: Vec<PrincipalPolicyRule>,
}

/// `ExportVariables = { name, definitions: map<Identifier, Expression> }`,
/// at most 100 definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportVariablesPolicy {
    pub metadata: PolicyMetadata,
    pub definitions: BTreeMap<String, String>,
}

/// `ExportConstants = { name, definitions: map<Identifier, Value> }`, at
/// most 100 definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConstantsPolicy {
    pub metadata: PolicyMetadata,
    pub definitions: BTreeMap<String, Value>,
}

/// `PolicyVariables = { import?, local? }` attached to a `ResourcePolicy`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyVariables {
    #[serde(default)]
    pub import: Vec<String>,
    #[serde(default)]
    pub local: BTreeMap<String, String>,
}

/// A single loaded policy document, tagged by kind (spec.md §6).
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedPolicy {
    Resource(ResourcePolicy),
    DerivedRoles(crate::derived_roles::DerivedRolesPolicy),
    Principal(PrincipalPolicy),
    ExportVariables(ExportVariablesPolicy),
    ExportConstants(ExportConstantsPolicy),
}
