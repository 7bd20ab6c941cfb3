//! C6: derived-roles resolution (spec.md §3.2, §4.6).

pub mod graph;
pub mod resolver;
pub mod types;

pub use graph::detect_cycle;
pub use resolver::{DerivedRolesCache, DerivedRolesResolver};
pub use types::{DerivedRolesPolicy, RoleDefinition};
