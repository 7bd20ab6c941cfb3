//! Indexed, append-only policy stores (spec.md §3.4), grounded in the
//! donor's `InMemoryPolicyStore` but reshaped to the scoped/kind-indexed
//! layout this engine requires and synchronous throughout.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::derived_roles::{DerivedRolesPolicy, RoleDefinition};
use crate::error::{AuthzError, Result};

use super::types::{ExportConstantsPolicy, ExportVariablesPolicy, PrincipalPolicy, ResourcePolicy};

#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyStoreStats {
    pub resource_policies: usize,
    pub scoped_resource_policies: usize,
    pub derived_roles_policies: usize,
    pub principal_policies: usize,
    pub resources: usize,
}

#[derive(Default)]
struct Inner {
    resource_policies: BTreeMap<String, Vec<Arc<ResourcePolicy>>>,
    scoped_resource_policies: BTreeMap<(String, String), Vec<Arc<ResourcePolicy>>>,
    derived_roles_policies: Vec<Arc<DerivedRolesPolicy>>,
    derived_role_index: BTreeMap<String, RoleDefinition>,
    principal_policies: BTreeMap<String, Vec<Arc<PrincipalPolicy>>>,
    export_variables: BTreeMap<String, ExportVariablesPolicy>,
    export_constants: BTreeMap<String, ExportConstantsPolicy>,
}

/// The engine's three indexed stores plus the export registries that back
/// variable resolution (C5). Loading is additive; `clear` empties
/// everything. A decision observes a single consistent snapshot because
/// every read takes one `read()` lock for its whole traversal.
#[derive(Default)]
pub struct PolicyStore {
    inner: RwLock<Inner>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `derivedRoles` reference on a rule must name a definition
    /// already registered by a loaded `DerivedRolesPolicy` (spec.md §3.2);
    /// callers that load a resource policy before the derived-roles policy
    /// it depends on will see this reject the load rather than silently
    /// evaluating the reference as never-admitted at check time.
    pub fn load_resource_policies(&self, policies: Vec<ResourcePolicy>) -> Result<()> {
        let mut inner = self.inner.write().expect("policy store lock poisoned");
        for policy in &policies {
            for rule in &policy.rules {
                for name in &rule.derived_roles {
                    if !inner.derived_role_index.contains_key(name) {
                        return Err(AuthzError::UndefinedDerivedRole(name.clone()));
                    }
                }
            }
        }
        for policy in policies {
            if let Some(scope) = policy.metadata.scope.clone().filter(|s| !s.is_empty()) {
                inner
                    .scoped_resource_policies
                    .entry((scope, policy.resource.clone()))
                    .or_default()
                    .push(Arc::new(policy));
            } else {
                inner
                    .resource_policies
                    .entry(policy.resource.clone())
                    .or_default()
                    .push(Arc::new(policy));
            }
        }
        Ok(())
    }

    /// Derived-roles policies are validated as a whole on every load: names
    /// must be unique across all loaded definitions and the combined
    /// dependency graph must be acyclic (spec.md §3.2, §4.6).
    pub fn load_derived_roles_policies(&self, policies: Vec<DerivedRolesPolicy>) -> Result<()> {
        let mut inner = self.inner.write().expect("policy store lock poisoned");

        let mut all_definitions: Vec<RoleDefinition> = inner
            .derived_roles_policies
            .iter()
            .flat_map(|p| p.definitions.clone())
            .collect();

        for policy in &policies {
            for def in &policy.definitions {
                if inner.derived_role_index.contains_key(&def.name)
                    || all_definitions.iter().any(|d| d.name == def.name)
                {
                    return Err(AuthzError::DuplicateDefinition(def.name.clone()));
                }
                all_definitions.push(def.clone());
            }
        }

        if let Some(cycle) = crate::derived_roles::detect_cycle(&all_definitions) {
            return Err(AuthzError::CircularDependency(cycle.join(" -> ")));
        }

        for policy in policies {
            for def in &policy.definitions {
                inner.derived_role_index.insert(def.name.clone(), def.clone());
            }
            inner.derived_roles_policies.push(Arc::new(policy));
        }
        Ok(())
    }

    pub fn load_principal_policies(&self, policies: Vec<PrincipalPolicy>) {
        let mut inner = self.inner.write().expect("policy store lock poisoned");
        for policy in policies {
            inner
                .principal_policies
                .entry(policy.principal.clone())
                .or_default()
                .push(Arc::new(policy));
        }
    }

    /// Export names are a single namespace shared by `ExportVariables` and
    /// `ExportConstants` (spec.md §4.5): registering either kind under a name
    /// already claimed by the other is rejected.
    pub fn load_export_variables(&self, exports: Vec<ExportVariablesPolicy>) -> Result<()> {
        let mut inner = self.inner.write().expect("policy store lock poisoned");
        for export in &exports {
            if inner.export_constants.contains_key(&export.metadata.name) {
                return Err(AuthzError::DuplicateExport(export.metadata.name.clone()));
            }
        }
        for export in exports {
            inner.export_variables.insert(export.metadata.name.clone(), export);
        }
        Ok(())
    }

    pub fn load_export_constants(&self, exports: Vec<ExportConstantsPolicy>) -> Result<()> {
        let mut inner = self.inner.write().expect("policy store lock poisoned");
        for export in &exports {
            if inner.export_variables.contains_key(&export.metadata.name) {
                return Err(AuthzError::DuplicateExport(export.metadata.name.clone()));
            }
        }
        for export in exports {
            inner.export_constants.insert(export.metadata.name.clone(), export);
        }
        Ok(())
    }

    pub fn resource_policies(&self, kind: &str) -> Vec<Arc<ResourcePolicy>> {
        let inner = self.inner.read().expect("policy store lock poisoned");
        inner.resource_policies.get(kind).cloned().unwrap_or_default()
    }

    pub fn scoped_resource_policies(&self, scope: &str, kind: &str) -> Option<Vec<Arc<ResourcePolicy>>> {
        let inner = self.inner.read().expect("policy store lock poisoned");
        inner
            .scoped_resource_policies
            .get(&(scope.to_string(), kind.to_string()))
            .cloned()
    }

    pub fn has_scoped_resource_policies(&self, scope: &str, kind: &str) -> bool {
        let inner = self.inner.read().expect("policy store lock poisoned");
        inner
            .scoped_resource_policies
            .contains_key(&(scope.to_string(), kind.to_string()))
    }

    pub fn derived_role_definitions(&self) -> Vec<RoleDefinition> {
        let inner = self.inner.read().expect("policy store lock poisoned");
        inner
            .derived_roles_policies
            .iter()
            .flat_map(|p| p.definitions.clone())
            .collect()
    }

    pub fn derived_role_exists(&self, name: &str) -> bool {
        let inner = self.inner.read().expect("policy store lock poisoned");
        inner.derived_role_index.contains_key(name)
    }

    pub fn principal_policies(&self, principal_id: &str) -> Vec<Arc<PrincipalPolicy>> {
        let inner = self.inner.read().expect("policy store lock poisoned");
        inner.principal_policies.get(principal_id).cloned().unwrap_or_default()
    }

    pub fn export_variables(&self, name: &str) -> Option<ExportVariablesPolicy> {
        let inner = self.inner.read().expect("policy store lock poisoned");
        inner.export_variables.get(name).cloned()
    }

    pub fn export_constants(&self, name: &str) -> Option<ExportConstantsPolicy> {
        let inner = self.inner.read().expect("policy store lock poisoned");
        inner.export_constants.get(name).cloned()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("policy store lock poisoned");
        *inner = Inner::default();
    }

    pub fn stats(&self) -> PolicyStoreStats {
        let inner = self.inner.read().expect("policy store lock poisoned");
        let resources: std::collections::BTreeSet<&str> = inner
            .resource_policies
            .keys()
            .map(String::as_str)
            .chain(inner.scoped_resource_policies.keys().map(|(_, k)| k.as_str()))
            .collect();
        PolicyStoreStats {
            resource_policies: inner.resource_policies.values().map(Vec::len).sum(),
            scoped_resource_policies: inner.scoped_resource_policies.values().map(Vec::len).sum(),
            derived_roles_policies: inner.derived_roles_policies.len(),
            principal_policies: inner.principal_policies.values().map(Vec::len).sum(),
            resources: resources.len(),
        }
    }
}
