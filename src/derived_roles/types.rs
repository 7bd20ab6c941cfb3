//! Derived-roles policy schema (spec.md §3.2).

use serde::{Deserialize, Serialize};

use crate::policy::types::PolicyMetadata;

/// A single derived-role definition inside a `DerivedRolesPolicy`.
///
/// `parent_roles` are patterns over the action-segment wildcard subset
/// (`*`, `prefix:*`, `*:suffix`) matched against the principal's current
/// role set with OR semantics: the definition is admitted if *any* pattern
/// matches *any* of the principal's roles (spec.md §4.6, resolved in
/// SPEC_FULL.md §5 against the donor's AND implementation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub name: String,
    pub parent_roles: Vec<String>,
    pub condition: String,
}

impl RoleDefinition {
    pub fn new(name: impl Into<String>, parent_roles: Vec<String>, condition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_roles,
            condition: condition.into(),
        }
    }
}

/// `DerivedRolesPolicy = { definitions: non-empty list<{name, parentRoles, condition}> }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedRolesPolicy {
    pub metadata: PolicyMetadata,
    pub definitions: Vec<RoleDefinition>,
}

impl DerivedRolesPolicy {
    pub fn new(name: impl Into<String>, definitions: Vec<RoleDefinition>) -> Self {
        Self {
            metadata: PolicyMetadata::new(name),
            definitions,
        }
    }
}
