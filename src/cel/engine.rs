//! C2: CEL expression engine (spec.md §4.2), backed by the process-wide
//! expression cache (C1, [`crate::cache::ExpressionCache`]).

use std::collections::HashMap;
use std::sync::Arc;

use cel_interpreter::objects::{Key, Map as CelMap, Value as CelValue};
use cel_interpreter::{Context, Program};

use crate::cache::{CacheStats, ExpressionCache, DEFAULT_CAPACITY};
use crate::value::Value;

use super::context::EvalContext;
use super::convert::{cel_to_value, value_to_cel};
use super::error::{CelError, ErrorType, Result};
use super::functions;

/// Recommended cap from spec.md §5: approximated here via paren-nesting
/// depth and a rough token count, since `cel_interpreter` does not expose
/// AST introspection for a precise node count.
const MAX_EXPRESSION_DEPTH: usize = 32;
const MAX_EXPRESSION_NODES: usize = 10_000;

fn check_complexity(src: &str) -> Result<()> {
    let mut depth: i64 = 0;
    let mut max_depth: i64 = 0;
    for c in src.chars() {
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    if max_depth as usize > MAX_EXPRESSION_DEPTH {
        return Err(CelError::ComplexityExceeded(format!(
            "nesting depth {} exceeds maximum {}",
            max_depth, MAX_EXPRESSION_DEPTH
        )));
    }
    let approx_nodes = src.split_whitespace().count().max(src.len() / 4);
    if approx_nodes > MAX_EXPRESSION_NODES {
        return Err(CelError::ComplexityExceeded(format!(
            "expression has an estimated {} nodes, exceeds maximum {}",
            approx_nodes, MAX_EXPRESSION_NODES
        )));
    }
    Ok(())
}

/// `evaluate(src, ctx) -> { success, value?, error?, errorType }`.
#[derive(Debug, Clone)]
pub struct EvalOutcome {
    pub success: bool,
    pub value: Option<Value>,
    pub error: Option<String>,
    pub error_type: Option<ErrorType>,
}

/// C2: compiles and evaluates CEL expressions against a frozen
/// [`EvalContext`].
pub struct Engine {
    cache: ExpressionCache<Program>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            cache: ExpressionCache::new(DEFAULT_CAPACITY),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: ExpressionCache::new(capacity),
        }
    }

    fn compiled(&self, src: &str) -> Result<Program> {
        check_complexity(src)?;
        self.cache
            .get_or_compile(src, |s| Program::compile(s).map_err(|e| CelError::Parse(format!("{:?}", e))))
    }

    /// `evaluate(src, ctx)`.
    pub fn evaluate(&self, src: &str, ctx: &EvalContext) -> EvalOutcome {
        match self.evaluate_inner(src, ctx) {
            Ok(value) => EvalOutcome {
                success: true,
                value: Some(value),
                error: None,
                error_type: None,
            },
            Err(e) => EvalOutcome {
                success: false,
                value: None,
                error: Some(e.to_string()),
                error_type: Some(e.error_type()),
            },
        }
    }

    /// `evaluateBoolean(src, ctx)` — fail-closed: any error yields `false`.
    pub fn evaluate_boolean(&self, src: &str, ctx: &EvalContext) -> bool {
        matches!(self.evaluate_inner(src, ctx), Ok(Value::Bool(true)))
    }

    /// `validateExpression(src)` — syntax only.
    pub fn validate_expression(&self, src: &str) -> std::result::Result<(), String> {
        check_complexity(src).map_err(|e| e.to_string())?;
        Program::compile(src).map(|_| ()).map_err(|e| format!("{:?}", e))
    }

    /// `compileExpression(src)` — pre-warm the cache.
    pub fn compile_expression(&self, src: &str) -> Result<()> {
        self.compiled(src)?;
        Ok(())
    }

    fn evaluate_inner(&self, src: &str, ctx: &EvalContext) -> Result<Value> {
        let program = self.compiled(src)?;
        let cel_context = build_context(ctx);
        let result = program
            .execute(&cel_context)
            .map_err(|e| CelError::Evaluation(format!("{:?}", e)))?;
        Ok(cel_to_value(&result))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn map_of(entries: Vec<(&str, CelValue)>) -> CelValue {
    let mut map: HashMap<Key, CelValue> = HashMap::new();
    for (k, v) in entries {
        map.insert(Key::from(k.to_string()), v);
    }
    CelValue::Map(CelMap { map: Arc::new(map) })
}

fn attrs_map(attrs: &crate::value::AttributeMap, extra: Vec<(&str, CelValue)>) -> CelValue {
    let mut entries: Vec<(&str, CelValue)> = attrs
        .iter()
        .map(|(k, v)| (k.as_str(), value_to_cel(v)))
        .collect();
    entries.extend(extra);
    map_of(entries)
}

fn build_context(ctx: &EvalContext) -> Context<'static> {
    let mut cel_context = Context::default();
    functions::register(&mut cel_context);

    let roles_list = CelValue::List(
        ctx.principal_roles
            .iter()
            .map(|r| CelValue::String(r.clone().into()))
            .collect::<Vec<_>>()
            .into(),
    );

    let principal = attrs_map(
        &ctx.principal_attrs,
        vec![
            ("id", CelValue::String(ctx.principal_id.clone().into())),
            ("roles", roles_list.clone()),
        ],
    );
    let resource = attrs_map(
        &ctx.resource_attrs,
        vec![
            ("kind", CelValue::String(ctx.resource_kind.clone().into())),
            ("id", CelValue::String(ctx.resource_id.clone().into())),
        ],
    );
    let aux_data = attrs_map(&ctx.aux_data, Vec::new());

    let request_principal = map_of(vec![
        ("id", CelValue::String(ctx.principal_id.clone().into())),
        ("roles", roles_list),
        ("attr", attrs_map(&ctx.principal_attrs, Vec::new())),
    ]);
    let request_resource = map_of(vec![
        ("kind", CelValue::String(ctx.resource_kind.clone().into())),
        ("id", CelValue::String(ctx.resource_id.clone().into())),
        ("attr", attrs_map(&ctx.resource_attrs, Vec::new())),
    ]);
    let request = map_of(vec![
        ("principal", request_principal),
        ("resource", request_resource),
        ("auxData", aux_data.clone()),
    ]);

    let variables = map_of(
        ctx.variables
            .iter()
            .map(|(k, v)| (k.as_str(), value_to_cel(v)))
            .collect(),
    );

    let _ = cel_context.add_variable("principal", principal);
    let _ = cel_context.add_variable("resource", resource);
    let _ = cel_context.add_variable("request", request);
    let _ = cel_context.add_variable("variables", variables);
    let _ = cel_context.add_variable("now", CelValue::Int(ctx.now_epoch_ms));
    let _ = cel_context.add_variable("nowTimestamp", CelValue::Int(ctx.now_epoch_ms));

    cel_context
}
