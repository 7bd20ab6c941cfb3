//! C5: variable resolution (spec.md §4.5).
//!
//! Imports are resolved against the store's export registries in
//! declaration order; locals are applied afterward and override both
//! imported variables and imported constants under the same name.

use std::collections::BTreeMap;

use crate::error::{AuthzError, Result};
use crate::policy::{PolicyStore, PolicyVariables};
use crate::value::Value;

/// `{ imports, localVariables, overrides, totalCount }` (spec.md §4.5).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionInfo {
    pub imports: Vec<String>,
    pub local_variables: Vec<String>,
    pub overrides: Vec<String>,
    pub total_count: usize,
}

/// `{ variables: map<name, compiled>, constants: map<name, value>, resolutionInfo }`.
///
/// `variables` holds CEL source text rather than a compiled `Program`: the
/// caller (C2, via [`crate::cel::Engine`]) compiles on first use and the
/// expression cache (C1) absorbs repeat compilation across requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedVariables {
    pub variables: BTreeMap<String, String>,
    pub constants: BTreeMap<String, Value>,
    pub resolution_info: ResolutionInfo,
}

pub fn resolve(policy_variables: &PolicyVariables, store: &PolicyStore) -> Result<ResolvedVariables> {
    let mut variables: BTreeMap<String, String> = BTreeMap::new();
    let mut constants: BTreeMap<String, Value> = BTreeMap::new();
    let mut imports = Vec::with_capacity(policy_variables.import.len());

    for import_name in &policy_variables.import {
        let mut matched = false;

        if let Some(export) = store.export_variables(import_name) {
            for (name, expr) in export.definitions {
                constants.remove(&name);
                variables.insert(name, expr);
            }
            matched = true;
        }
        if let Some(export) = store.export_constants(import_name) {
            for (name, value) in export.definitions {
                variables.remove(&name);
                constants.insert(name, value);
            }
            matched = true;
        }

        if !matched {
            return Err(AuthzError::UnknownExport(import_name.clone()));
        }
        imports.push(import_name.clone());
    }

    let mut overrides = Vec::new();
    for (name, expr) in &policy_variables.local {
        if constants.remove(name).is_some() || variables.contains_key(name) {
            overrides.push(name.clone());
        }
        variables.insert(name.clone(), expr.clone());
    }

    let total_count = variables.len() + constants.len();
    Ok(ResolvedVariables {
        variables,
        constants,
        resolution_info: ResolutionInfo {
            imports,
            local_variables: policy_variables.local.keys().cloned().collect(),
            overrides,
            total_count,
        },
    })
}
