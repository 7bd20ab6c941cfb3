//! # authz-core
//!
//! Core policy-based authorization decision engine, Cerbos-compatible.
//!
//! Given `(principal, resource, actions, auxData, optional scope)` and a
//! loaded set of policies, [`DecisionEngine::check`] produces a
//! deterministic allow/deny decision per action with provenance (which
//! policy/rule matched) and structured telemetry.
//!
//! Rate limiting, quota management, audit transport, observability
//! exporters, the RPC/HTTP surface and policy hot-reload from disk are all
//! external collaborators — this crate is synchronous, CPU-bound, and has
//! no network or filesystem I/O of its own. Callers wire in an
//! [`engine::AuditLogger`] for decision events and a `tracing` subscriber
//! for the spans this crate emits.
//!
//! ## Example
//!
//! ```
//! use authz_core::{DecisionEngine, PolicyStore};
//! use authz_core::policy::{PolicyMetadata, ResourcePolicy, Rule};
//! use authz_core::types::{CheckRequest, Effect, Principal, Resource};
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//!
//! let store = Arc::new(PolicyStore::new());
//! store.load_resource_policies(vec![ResourcePolicy {
//!     metadata: PolicyMetadata::new("document-policy"),
//!     resource: "document".to_string(),
//!     rules: vec![Rule {
//!         name: Some("owner-read".to_string()),
//!         actions: vec!["read".to_string()],
//!         effect: Effect::Allow,
//!         roles: BTreeSet::new(),
//!         derived_roles: BTreeSet::new(),
//!         condition: Some("resource.ownerId == principal.id".to_string()),
//!     }],
//!     variables: None,
//! }]).unwrap();
//!
//! let engine = DecisionEngine::new(store);
//! let request = CheckRequest::new(
//!     Principal::new("u1"),
//!     Resource::new("document", "d1").with_attribute("ownerId", "u1"),
//!     vec!["read".to_string()],
//! );
//! let response = engine.check(request);
//! assert_eq!(response.results["read"].effect, Effect::Allow);
//! ```

pub mod cache;
pub mod cel;
pub mod derived_roles;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod policy;
pub mod scope;
pub mod types;
pub mod value;
pub mod variables;

pub use engine::{DecisionEngine, EngineConfig, EngineStats};
pub use error::{AuthzError, Result};
pub use policy::PolicyStore;
pub use types::{ActionResult, CheckRequest, CheckResponse, Effect, Principal, Resource};
pub use value::Value;

/// Library version, set from `Cargo.toml` at build time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
