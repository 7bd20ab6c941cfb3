//! Audit events for authorization decisions (spec.md §6), emitted via an
//! injected callback rather than a fixed storage backend — the donor's
//! PostgreSQL-backed logger is replaced with a trait so the engine stays
//! free of a database dependency; callers wire in their own sink.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::types::{ActionResult, CheckRequest, ResponseMeta};

/// One completed `check()` call, ready for a caller-supplied sink.
#[derive(Debug, Clone)]
pub struct DecisionEvent {
    pub request_id: String,
    pub principal_id: String,
    pub resource_kind: String,
    pub resource_id: String,
    pub results: BTreeMap<String, ActionResult>,
    pub meta: ResponseMeta,
    pub timestamp: DateTime<Utc>,
}

impl DecisionEvent {
    pub fn from_request(request: &CheckRequest, request_id: &str, results: BTreeMap<String, ActionResult>, meta: ResponseMeta) -> Self {
        Self {
            request_id: request_id.to_string(),
            principal_id: request.principal.id.clone(),
            resource_kind: request.resource.kind.clone(),
            resource_id: request.resource.id.clone(),
            results,
            meta,
            timestamp: Utc::now(),
        }
    }
}

/// Injectable audit sink (spec.md §6: `setAuditLogger`/`setAuditEnabled`).
pub trait AuditLogger: Send + Sync {
    fn log(&self, event: &DecisionEvent);
}

/// Default logger: discards every event.
#[derive(Debug, Default)]
pub struct NoopAuditLogger;

impl AuditLogger for NoopAuditLogger {
    fn log(&self, _event: &DecisionEvent) {}
}
